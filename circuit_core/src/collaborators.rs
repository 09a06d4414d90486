//! Contracts for the services a workout session calls into.
//!
//! The session never talks to a health store, purchase API or database
//! directly. It receives these traits at construction time and treats each
//! one as an opaque capability:
//! - [`PersistenceSink`] stores the finished workout
//! - [`MetricsSource`] streams live heart-rate readings
//! - [`EntitlementCheck`] gates premium-only side channels
//! - [`ErrorSink`] surfaces failures to the user

use crate::{CompletionRecord, Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Receives the completion record at the end of a workout
///
/// `save` may block. The session runner calls it from a context where
/// blocking does not stall other tasks on a multi-thread runtime.
pub trait PersistenceSink: Send {
    fn save(&mut self, record: &CompletionRecord) -> Result<()>;
}

/// An event pushed by a metric subscription
#[derive(Clone, Debug, PartialEq)]
pub enum MetricEvent {
    /// Heart rate in beats per minute
    Reading(f64),
    /// The source gave up; no more readings will follow
    Failed(String),
}

/// Asynchronous stream of metric events
pub type MetricStream = mpsc::Receiver<MetricEvent>;

/// How a sampling subscription ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingOutcome {
    /// The workout completed and its data should be kept
    Finished,
    /// The workout was dismissed; discard anything buffered
    Discarded,
}

/// Source of live heart-rate readings
pub trait MetricsSource: Send {
    fn start_sampling(&mut self) -> Result<MetricStream>;
    fn stop_sampling(&mut self, outcome: SamplingOutcome);
}

/// Read-only premium status
pub trait EntitlementCheck: Send {
    fn is_premium_active(&self) -> bool;
}

/// Fire-and-forget user-facing error reporting
pub trait ErrorSink: Send {
    fn report(&self, message: &str);
}

// ============================================================================
// Metrics sources
// ============================================================================

/// A metrics source that never produces readings
#[derive(Debug, Default)]
pub struct NoMetrics;

impl MetricsSource for NoMetrics {
    fn start_sampling(&mut self) -> Result<MetricStream> {
        Err(Error::Metrics("no heart-rate source available".into()))
    }

    fn stop_sampling(&mut self, _outcome: SamplingOutcome) {}
}

/// Hands a caller-supplied receiver to the session
///
/// Useful when readings come from somewhere the caller already owns,
/// such as a BLE bridge or a test.
#[derive(Debug)]
pub struct ChannelMetrics {
    receiver: Option<MetricStream>,
    stopped: Option<SamplingOutcome>,
}

impl ChannelMetrics {
    pub fn new(receiver: MetricStream) -> Self {
        Self {
            receiver: Some(receiver),
            stopped: None,
        }
    }

    /// Create a connected sender/source pair
    pub fn channel(capacity: usize) -> (mpsc::Sender<MetricEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }

    /// How sampling was stopped, if it was
    pub fn stopped_with(&self) -> Option<SamplingOutcome> {
        self.stopped
    }
}

impl MetricsSource for ChannelMetrics {
    fn start_sampling(&mut self) -> Result<MetricStream> {
        self.receiver
            .take()
            .ok_or_else(|| Error::Metrics("metric channel already consumed".into()))
    }

    fn stop_sampling(&mut self, outcome: SamplingOutcome) {
        self.stopped = Some(outcome);
    }
}

/// Deterministic heart-rate generator for demos
///
/// Ramps from a warm-up rate towards a working rate with a small wobble,
/// emitting one reading per `period`. Requires a running tokio runtime.
pub struct SimulatedHeartRate {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl SimulatedHeartRate {
    pub fn new(period: Duration) -> Self {
        Self { period, task: None }
    }

    /// Reading for the n-th sample
    pub fn reading_at(sample: u32) -> f64 {
        let ramp = f64::from(sample.saturating_mul(3).min(70));
        let wobble = f64::from(sample % 5);
        90.0 + ramp + wobble
    }
}

impl MetricsSource for SimulatedHeartRate {
    fn start_sampling(&mut self) -> Result<MetricStream> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Metrics(format!("no async runtime: {}", e)))?;

        let (tx, rx) = mpsc::channel(16);
        let period = self.period;
        self.task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut sample = 0u32;
            loop {
                ticker.tick().await;
                let bpm = SimulatedHeartRate::reading_at(sample);
                if tx.send(MetricEvent::Reading(bpm)).await.is_err() {
                    break;
                }
                sample = sample.wrapping_add(1);
            }
        }));

        tracing::debug!("Simulated heart-rate sampling started ({:?} period)", period);
        Ok(rx)
    }

    fn stop_sampling(&mut self, outcome: SamplingOutcome) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Simulated heart-rate sampling stopped ({:?})", outcome);
        }
    }
}

impl Drop for SimulatedHeartRate {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// Entitlement and error reporting
// ============================================================================

/// Fixed premium status, typically read from config
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticEntitlement(pub bool);

impl EntitlementCheck for StaticEntitlement {
    fn is_premium_active(&self) -> bool {
        self.0
    }
}

/// Reports errors through tracing only
#[derive(Debug, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

// ============================================================================
// In-memory persistence
// ============================================================================

/// Keeps completion records in memory
///
/// Clones share the same storage, so a caller can hand one clone to a
/// session and inspect what was saved through another.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<CompletionRecord>>>,
    fail_with: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every save fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Arc::default(),
            fail_with: Some(message.into()),
        }
    }

    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl PersistenceSink for MemorySink {
    fn save(&mut self, record: &CompletionRecord) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(Error::Persist(message.clone()));
        }

        self.records
            .lock()
            .map_err(|_| Error::Persist("in-memory history lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}
