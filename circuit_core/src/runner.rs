//! Async driver for a [`WorkoutSession`].
//!
//! The session is moved into a single tokio task which is its only writer.
//! Commands from the presentation layer arrive over an mpsc channel, the
//! elapsed-time tick and the heart-rate subscription are polled in the same
//! `select!`, and every change is published as a [`SessionSnapshot`] on a
//! watch channel.
//!
//! The tick exists only while the session is running. Both the tick and the
//! metric subscription are dropped on every terminal path, including the
//! one taken when all handles to the session go away.

use crate::collaborators::{MetricEvent, MetricStream};
use crate::session::{SessionOutcome, WorkoutSession};
use crate::{Config, Error, Result, SessionPhase, SessionSnapshot};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Commands accepted by a running session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Advance,
    TogglePause,
    Complete { early: bool },
    EndEarly,
}

/// Runner settings
#[derive(Clone, Copy, Debug)]
pub struct RunnerOptions {
    pub tick_interval: Duration,
    pub command_buffer: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            command_buffer: 32,
        }
    }
}

impl From<&Config> for RunnerOptions {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: config.session.tick_interval(),
            ..Self::default()
        }
    }
}

/// Cloneable sender of session commands
///
/// The session is torn down once every controller (including the one
/// inside [`SessionHandle`]) has been dropped.
#[derive(Clone, Debug)]
pub struct SessionController {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionController {
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::SessionClosed)
    }

    /// Send from a thread outside the async runtime
    pub fn send_blocking(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .blocking_send(command)
            .map_err(|_| Error::SessionClosed)
    }

    pub async fn start(&self) -> Result<()> {
        self.send(SessionCommand::Start).await
    }

    pub async fn advance(&self) -> Result<()> {
        self.send(SessionCommand::Advance).await
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.send(SessionCommand::TogglePause).await
    }

    pub async fn complete(&self, early: bool) -> Result<()> {
        self.send(SessionCommand::Complete { early }).await
    }

    pub async fn end_early(&self) -> Result<()> {
        self.send(SessionCommand::EndEarly).await
    }
}

/// Owner-side handle to a spawned session
pub struct SessionHandle {
    controller: SessionController,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn controller(&self) -> SessionController {
        self.controller.clone()
    }

    pub async fn start(&self) -> Result<()> {
        self.controller.start().await
    }

    pub async fn advance(&self) -> Result<()> {
        self.controller.advance().await
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.controller.toggle_pause().await
    }

    pub async fn complete(&self, early: bool) -> Result<()> {
        self.controller.complete(early).await
    }

    pub async fn end_early(&self) -> Result<()> {
        self.controller.end_early().await
    }

    /// Latest published state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the session to reach a terminal phase
    ///
    /// Drops this handle's controller first, so if no other controller is
    /// alive the session is torn down instead of waiting forever.
    pub async fn finished(self) -> Result<SessionOutcome> {
        let SessionHandle {
            controller, task, ..
        } = self;
        drop(controller);
        task.await
            .map_err(|e| Error::Other(format!("session task failed: {}", e)))
    }
}

/// Move `session` onto its own task and return a handle to drive it
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(session: WorkoutSession, options: RunnerOptions) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(options.command_buffer.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

    let task = tokio::spawn(run_session(session, command_rx, snapshot_tx, options));

    SessionHandle {
        controller: SessionController {
            commands: command_tx,
        },
        snapshots: snapshot_rx,
        task,
    }
}

enum Wakeup {
    Command(Option<SessionCommand>),
    Tick,
    Metric(Option<MetricEvent>),
}

async fn run_session(
    mut session: WorkoutSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    options: RunnerOptions,
) -> SessionOutcome {
    let mut ticker: Option<Interval> = None;
    let mut metrics: Option<MetricStream> = None;

    loop {
        let wakeup = tokio::select! {
            command = commands.recv() => Wakeup::Command(command),
            _ = next_tick(&mut ticker) => Wakeup::Tick,
            event = next_metric(&mut metrics) => Wakeup::Metric(event),
        };

        match wakeup {
            Wakeup::Command(Some(command)) => off_worker(|| apply(&mut session, command)),
            Wakeup::Command(None) => {
                tracing::info!("All session controllers dropped; tearing down");
                session.teardown();
            }
            Wakeup::Tick => session.tick(),
            Wakeup::Metric(Some(MetricEvent::Reading(bpm))) => session.record_reading(bpm),
            Wakeup::Metric(Some(MetricEvent::Failed(reason))) => {
                session.metrics_lost(&reason);
                metrics = None;
            }
            Wakeup::Metric(None) => {
                session.metrics_lost("stream closed");
                metrics = None;
            }
        }

        if let Some(stream) = session.take_metric_stream() {
            metrics = Some(stream);
        }

        match (session.phase() == SessionPhase::Running, ticker.is_some()) {
            (true, false) => ticker = Some(new_ticker(options.tick_interval)),
            (false, true) => ticker = None,
            _ => {}
        }

        snapshots.send_replace(session.snapshot());

        if session.phase().is_terminal() {
            break;
        }
    }

    drop(ticker);
    drop(metrics);

    session
        .outcome()
        .cloned()
        .unwrap_or(SessionOutcome::Discarded)
}

fn apply(session: &mut WorkoutSession, command: SessionCommand) {
    tracing::debug!("Session command: {:?}", command);
    match command {
        SessionCommand::Start => {
            session.start();
        }
        SessionCommand::Advance => {
            session.advance();
        }
        SessionCommand::TogglePause => {
            session.toggle_pause();
        }
        SessionCommand::Complete { early } => {
            session.complete(early);
        }
        SessionCommand::EndEarly => {
            session.end_early();
        }
    }
}

/// Run `f` where blocking is allowed
///
/// Commands can end in a `PersistenceSink::save`, which may wait on a file
/// lock. On a multi-thread runtime the worker hands its other tasks off
/// first; a current-thread runtime has no other worker to hand them to.
fn off_worker<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn next_metric(metrics: &mut Option<MetricStream>) -> Option<MetricEvent> {
    match metrics {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}
