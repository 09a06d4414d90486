//! Workout session state machine.
//!
//! A [`WorkoutSession`] owns the run-time progression of one attempt at a
//! plan: elapsed time, the current step and round, recorded splits, and the
//! terminal hand-off to history.
//!
//! ```text
//! NotStarted -> Running <-> Paused
//!                  |           |
//!                  |           +--> Ended (end_early / teardown)
//!                  +--> Completing -> Completed
//! ```
//!
//! Calls that do not apply to the current phase are ignored rather than
//! treated as errors, so duplicate UI triggers are harmless. All timing is
//! derived from absolute instants supplied by a [`Clock`]; nothing is
//! accumulated per tick.

use crate::clock::Clock;
use crate::collaborators::{
    EntitlementCheck, ErrorSink, MetricStream, MetricsSource, PersistenceSink, SamplingOutcome,
};
use crate::{
    CompletionRecord, Config, DeviceProfile, ExerciseStep, HeartRateSummary, HeartRateZone, SessionPhase,
    SessionSnapshot, SplitRecord, WorkoutPlan,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Services a session calls into
pub struct Collaborators {
    pub persistence: Box<dyn PersistenceSink>,
    pub metrics: Box<dyn MetricsSource>,
    pub entitlement: Box<dyn EntitlementCheck>,
    pub errors: Box<dyn ErrorSink>,
}

/// Per-device session settings
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub device: DeviceProfile,
    pub max_heart_rate: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device: DeviceProfile::Phone,
            max_heart_rate: 190,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            device: config.device.profile,
            max_heart_rate: config.heart_rate.max_bpm,
        }
    }
}

/// What a successful `advance()` did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the step at this index within the current round
    NextStep(usize),
    /// Wrapped to the first step of this round number
    NextRound(u32),
    /// The last step of the last round was finished
    Completed,
}

/// How a session ended
#[derive(Clone, Debug, PartialEq)]
pub enum SessionOutcome {
    /// A completion record was built and written to history
    Saved(CompletionRecord),
    /// A completion record was built but could not be written; it is gone
    SaveFailed { error: String },
    /// Dismissed without building a record
    Discarded,
}

#[derive(Debug, Default)]
struct HeartRateAccumulator {
    sum: f64,
    min: f64,
    max: f64,
    samples: u32,
}

impl HeartRateAccumulator {
    fn add(&mut self, bpm: f64) {
        if self.samples == 0 {
            self.min = bpm;
            self.max = bpm;
        } else {
            self.min = self.min.min(bpm);
            self.max = self.max.max(bpm);
        }
        self.sum += bpm;
        self.samples += 1;
    }

    fn summary(&self) -> Option<HeartRateSummary> {
        if self.samples == 0 {
            return None;
        }
        Some(HeartRateSummary {
            average_bpm: self.sum / f64::from(self.samples),
            min_bpm: self.min,
            max_bpm: self.max,
            samples: self.samples,
        })
    }
}

/// Run-time state of a single workout attempt
pub struct WorkoutSession {
    plan_id: String,
    plan_name: String,
    steps: Vec<ExerciseStep>,
    rounds_enabled: bool,
    total_rounds: u32,
    options: SessionOptions,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,

    phase: SessionPhase,
    started_at: Option<DateTime<Utc>>,
    session_start: Option<Instant>,
    step_start: Option<Instant>,
    paused_at: Option<Instant>,
    elapsed: Duration,
    step_index: usize,
    current_round: u32,
    rounds_finished: u32,
    splits: Vec<SplitRecord>,

    heart_rate: Option<f64>,
    zone: Option<HeartRateZone>,
    heart_rate_log: Option<HeartRateAccumulator>,
    sampling: bool,
    metric_stream: Option<MetricStream>,

    outcome: Option<SessionOutcome>,
}

impl WorkoutSession {
    pub fn new(
        plan: &WorkoutPlan,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        options: SessionOptions,
    ) -> Self {
        Self {
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            steps: plan.ordered_steps(),
            rounds_enabled: plan.rounds_enabled,
            total_rounds: plan.total_rounds(),
            options,
            clock,
            collaborators,
            phase: SessionPhase::NotStarted,
            started_at: None,
            session_start: None,
            step_start: None,
            paused_at: None,
            elapsed: Duration::ZERO,
            step_index: 0,
            current_round: 1,
            rounds_finished: 0,
            splits: Vec::new(),
            heart_rate: None,
            zone: None,
            heart_rate_log: None,
            sampling: false,
            metric_stream: None,
            outcome: None,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Begin timing and metric sampling
    ///
    /// Returns false if the session was already started.
    pub fn start(&mut self) -> bool {
        if self.phase != SessionPhase::NotStarted {
            tracing::debug!("Ignoring start() while {:?}", self.phase);
            return false;
        }

        let now = self.clock.now();
        self.started_at = Some(self.clock.utc_now());
        self.session_start = Some(now);
        self.step_start = Some(now);
        self.elapsed = Duration::ZERO;
        self.phase = SessionPhase::Running;

        if self.options.device.is_wearable() && self.collaborators.entitlement.is_premium_active() {
            tracing::debug!("Premium wearable session: recording heart-rate summary");
            self.heart_rate_log = Some(HeartRateAccumulator::default());
        }

        match self.collaborators.metrics.start_sampling() {
            Ok(stream) => {
                self.metric_stream = Some(stream);
                self.sampling = true;
            }
            Err(e) => {
                tracing::warn!("Heart-rate sampling unavailable: {}. Continuing without it.", e);
            }
        }

        tracing::info!(
            "Started '{}' ({} steps, {} rounds)",
            self.plan_name,
            self.steps.len(),
            self.total_rounds
        );
        true
    }

    /// Close out the current step and move to the next one
    ///
    /// Returns None if the session is not running.
    pub fn advance(&mut self) -> Option<Advance> {
        if self.phase != SessionPhase::Running {
            tracing::debug!("Ignoring advance() while {:?}", self.phase);
            return None;
        }

        let now = self.clock.now();
        let step_started = self.step_start.unwrap_or(now);
        self.splits.push(SplitRecord {
            duration_seconds: now.saturating_duration_since(step_started).as_secs_f64(),
            step_index: self.step_index,
        });
        self.step_start = Some(now);
        self.refresh_elapsed(now);

        let total_steps = self.steps.len();

        // An empty plan is a single timed block
        if total_steps == 0 {
            self.rounds_finished = 1;
            self.finish(false);
            return Some(Advance::Completed);
        }

        if self.step_index + 1 < total_steps {
            self.step_index += 1;
            tracing::debug!("Advanced to step {}", self.step_index);
            return Some(Advance::NextStep(self.step_index));
        }

        if self.rounds_enabled {
            self.step_index = 0;
            self.rounds_finished += 1;
            if self.current_round < self.total_rounds {
                self.current_round += 1;
                tracing::debug!("Starting round {}/{}", self.current_round, self.total_rounds);
                return Some(Advance::NextRound(self.current_round));
            }
        } else {
            self.rounds_finished = 1;
        }

        self.finish(false);
        Some(Advance::Completed)
    }

    /// Switch between running and paused
    ///
    /// Time spent paused is excluded from both elapsed and step timing.
    pub fn toggle_pause(&mut self) -> bool {
        let now = self.clock.now();
        match self.phase {
            SessionPhase::Running => {
                self.refresh_elapsed(now);
                self.paused_at = Some(now);
                self.phase = SessionPhase::Paused;
                tracing::info!("Paused at {:.1}s", self.elapsed.as_secs_f64());
                true
            }
            SessionPhase::Paused => {
                let paused_for = self
                    .paused_at
                    .take()
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
                self.session_start = self.session_start.map(|t| t + paused_for);
                self.step_start = self.step_start.map(|t| t + paused_for);
                self.phase = SessionPhase::Running;
                tracing::info!("Resumed after {:.1}s paused", paused_for.as_secs_f64());
                true
            }
            _ => {
                tracing::debug!("Ignoring toggle_pause() while {:?}", self.phase);
                false
            }
        }
    }

    /// Recompute elapsed time; a no-op unless running
    pub fn tick(&mut self) {
        if self.phase == SessionPhase::Running {
            let now = self.clock.now();
            self.refresh_elapsed(now);
        }
    }

    /// End the workout and save it
    ///
    /// `early` marks a workout the user stopped before its last step.
    /// The session ends even when the history write fails.
    pub fn complete(&mut self, early: bool) -> Option<SessionOutcome> {
        if self.phase != SessionPhase::Running {
            tracing::debug!("Ignoring complete() while {:?}", self.phase);
            return None;
        }
        let now = self.clock.now();
        self.refresh_elapsed(now);
        Some(self.finish(early))
    }

    /// Dismiss the workout without saving anything
    pub fn end_early(&mut self) -> bool {
        if !self.phase.is_active() {
            tracing::debug!("Ignoring end_early() while {:?}", self.phase);
            return false;
        }
        self.terminate();
        tracing::info!("Workout '{}' ended without saving", self.plan_name);
        true
    }

    /// Abnormal teardown: stop background work from any non-terminal phase
    pub fn teardown(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::debug!("Tearing down session in {:?}", self.phase);
        self.terminate();
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Hand the metric subscription opened by `start()` to whoever drives it
    pub fn take_metric_stream(&mut self) -> Option<MetricStream> {
        self.metric_stream.take()
    }

    /// Apply a live heart-rate reading
    pub fn record_reading(&mut self, bpm: f64) {
        if self.phase.is_terminal() {
            return;
        }
        if !bpm.is_finite() || bpm <= 0.0 {
            tracing::warn!("Ignoring invalid heart-rate reading: {}", bpm);
            return;
        }

        self.heart_rate = Some(bpm);
        self.zone = Some(HeartRateZone::from_bpm(bpm, self.options.max_heart_rate));
        if let Some(log) = self.heart_rate_log.as_mut() {
            log.add(bpm);
        }
    }

    /// The metric subscription failed or ended; carry on without it
    pub fn metrics_lost(&mut self, reason: &str) {
        tracing::warn!("Heart-rate updates stopped: {}", reason);
        self.heart_rate = None;
        self.zone = None;
        self.metric_stream = None;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn current_step(&self) -> Option<&ExerciseStep> {
        self.steps.get(self.step_index)
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn splits(&self) -> &[SplitRecord] {
        &self.splits
    }

    pub fn heart_rate(&self) -> Option<f64> {
        self.heart_rate
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            elapsed_seconds: self.elapsed_seconds(),
            step_index: self.step_index,
            step_name: self.current_step().map(|s| s.name.clone()),
            total_steps: self.steps.len(),
            current_round: self.current_round,
            total_rounds: self.total_rounds,
            splits_recorded: self.splits.len(),
            heart_rate_bpm: self.heart_rate,
            heart_rate_zone: self.zone,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn refresh_elapsed(&mut self, now: Instant) {
        if let Some(start) = self.session_start {
            self.elapsed = now.saturating_duration_since(start);
        }
    }

    fn finish(&mut self, early: bool) -> SessionOutcome {
        self.phase = SessionPhase::Completing;
        self.metric_stream = None;

        let record = CompletionRecord {
            id: Uuid::new_v4(),
            plan_id: self.plan_id.clone(),
            plan_name: self.plan_name.clone(),
            started_at: self.started_at.unwrap_or_else(|| self.clock.utc_now()),
            completed_at: self.clock.utc_now(),
            duration_minutes: self.elapsed.as_secs_f64() / 60.0,
            splits: self.splits.clone(),
            early,
            rounds_completed: self.rounds_finished,
            heart_rate: self.heart_rate_log.as_ref().and_then(|log| log.summary()),
        };

        let outcome = match self.collaborators.persistence.save(&record) {
            Ok(()) => {
                tracing::info!(
                    "Saved workout {} ({:.1} min, {} splits)",
                    record.id,
                    record.duration_minutes,
                    record.splits.len()
                );
                SessionOutcome::Saved(record)
            }
            Err(e) => {
                tracing::warn!("Failed to save workout {}: {}", record.id, e);
                self.collaborators
                    .errors
                    .report(&format!("Your workout could not be saved: {}", e));
                SessionOutcome::SaveFailed {
                    error: e.to_string(),
                }
            }
        };

        self.stop_sampling(SamplingOutcome::Finished);
        self.phase = SessionPhase::Completed;
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn terminate(&mut self) {
        if self.phase == SessionPhase::Running {
            let now = self.clock.now();
            self.refresh_elapsed(now);
        }
        self.metric_stream = None;
        self.stop_sampling(SamplingOutcome::Discarded);
        self.paused_at = None;
        self.phase = SessionPhase::Ended;
        self.outcome = Some(SessionOutcome::Discarded);
    }

    fn stop_sampling(&mut self, outcome: SamplingOutcome) {
        if self.sampling {
            self.sampling = false;
            self.collaborators.metrics.stop_sampling(outcome);
        }
    }
}

impl Drop for WorkoutSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collaborators::{ChannelMetrics, MemorySink, MetricEvent, NoMetrics, StaticEntitlement};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CollectingErrors(Arc<Mutex<Vec<String>>>);

    impl ErrorSink for CollectingErrors {
        fn report(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    /// Records how sampling was stopped, shared with the test body
    #[derive(Clone, Default)]
    struct SpyMetrics {
        started: Arc<Mutex<u32>>,
        stopped: Arc<Mutex<Vec<SamplingOutcome>>>,
    }

    impl MetricsSource for SpyMetrics {
        fn start_sampling(&mut self) -> crate::Result<MetricStream> {
            *self.started.lock().unwrap() += 1;
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        fn stop_sampling(&mut self, outcome: SamplingOutcome) {
            self.stopped.lock().unwrap().push(outcome);
        }
    }

    fn plan(steps: usize, rounds: Option<u32>) -> WorkoutPlan {
        WorkoutPlan {
            id: "test_plan".into(),
            name: "Test Plan".into(),
            steps: (0..steps)
                .map(|i| ExerciseStep::new(format!("step {}", i), i as i32))
                .collect(),
            rounds_enabled: rounds.is_some(),
            rounds_quantity: rounds.unwrap_or(1),
        }
    }

    struct Harness {
        session: WorkoutSession,
        clock: Arc<ManualClock>,
        sink: MemorySink,
        errors: CollectingErrors,
        metrics: SpyMetrics,
    }

    fn harness_with(plan: &WorkoutPlan, sink: MemorySink, options: SessionOptions, premium: bool) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let errors = CollectingErrors::default();
        let metrics = SpyMetrics::default();
        let session = WorkoutSession::new(
            plan,
            Collaborators {
                persistence: Box::new(sink.clone()),
                metrics: Box::new(metrics.clone()),
                entitlement: Box::new(StaticEntitlement(premium)),
                errors: Box::new(errors.clone()),
            },
            clock.clone(),
            options,
        );
        Harness {
            session,
            clock,
            sink,
            errors,
            metrics,
        }
    }

    fn harness(plan: &WorkoutPlan) -> Harness {
        harness_with(plan, MemorySink::new(), SessionOptions::default(), false)
    }

    #[test]
    fn test_three_steps_without_rounds() {
        let mut h = harness(&plan(3, None));
        assert!(h.session.start());

        assert_eq!(h.session.advance(), Some(Advance::NextStep(1)));
        assert_eq!(h.session.advance(), Some(Advance::NextStep(2)));
        assert_eq!(h.session.step_index(), 2);
        assert_eq!(h.session.phase(), SessionPhase::Running);

        assert_eq!(h.session.advance(), Some(Advance::Completed));
        assert_eq!(h.session.phase(), SessionPhase::Completed);
        assert_eq!(h.session.splits().len(), 3);

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].splits.len(), 3);
        assert!(!records[0].early);
        assert_eq!(records[0].rounds_completed, 1);
    }

    #[test]
    fn test_two_steps_two_rounds() {
        let mut h = harness(&plan(2, Some(2)));
        h.session.start();

        assert_eq!(h.session.advance(), Some(Advance::NextStep(1)));
        assert_eq!(h.session.current_round(), 1);

        assert_eq!(h.session.advance(), Some(Advance::NextRound(2)));
        assert_eq!(h.session.step_index(), 0);
        assert_eq!(h.session.current_round(), 2);

        assert_eq!(h.session.advance(), Some(Advance::NextStep(1)));
        assert_eq!(h.session.phase(), SessionPhase::Running);

        assert_eq!(h.session.advance(), Some(Advance::Completed));
        assert_eq!(h.session.phase(), SessionPhase::Completed);
        assert_eq!(h.session.splits().len(), 4);
        assert_eq!(h.sink.records()[0].rounds_completed, 2);
    }

    #[test]
    fn test_empty_plan_completes_on_first_advance() {
        let mut h = harness(&plan(0, None));
        h.session.start();
        assert!(h.session.current_step().is_none());

        h.clock.advance(Duration::from_secs(600));
        assert_eq!(h.session.advance(), Some(Advance::Completed));
        assert_eq!(h.session.splits().len(), 1);
        assert_eq!(h.session.splits()[0].duration_seconds, 600.0);

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert!((records[0].duration_minutes - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_plan_with_rounds_still_completes_immediately() {
        let mut h = harness(&plan(0, Some(3)));
        h.session.start();
        assert_eq!(h.session.advance(), Some(Advance::Completed));

        // One timed block counts as one round, whatever the plan asks for
        let records = h.sink.records();
        assert_eq!(records[0].rounds_completed, 1);
        assert_eq!(records[0].splits.len(), 1);
    }

    #[test]
    fn test_advance_count_matches_steps_times_rounds() {
        for steps in 1..=4 {
            for rounds in 1..=3 {
                let mut h = harness(&plan(steps, Some(rounds)));
                h.session.start();
                let total = steps * rounds as usize;

                for call in 1..total {
                    let result = h.session.advance();
                    assert_ne!(result, Some(Advance::Completed), "completed early at call {}", call);
                    assert_eq!(h.session.phase(), SessionPhase::Running);
                    assert!(h.session.step_index() < steps);
                    assert!(h.session.current_round() <= rounds);
                }

                assert_eq!(h.session.advance(), Some(Advance::Completed));
                assert_eq!(h.session.splits().len(), total);
            }
        }
    }

    #[test]
    fn test_split_durations_follow_clock() {
        let mut h = harness(&plan(2, None));
        h.session.start();

        h.clock.advance(Duration::from_secs(30));
        h.session.advance();
        h.clock.advance(Duration::from_secs(45));
        h.session.advance();

        let splits = h.session.splits();
        assert_eq!(splits[0], SplitRecord { duration_seconds: 30.0, step_index: 0 });
        assert_eq!(splits[1], SplitRecord { duration_seconds: 45.0, step_index: 1 });
    }

    #[test]
    fn test_invalid_transitions_are_ignored() {
        let mut h = harness(&plan(2, None));

        assert_eq!(h.session.advance(), None);
        assert!(!h.session.toggle_pause());
        assert_eq!(h.session.complete(true), None);
        assert!(!h.session.end_early());
        assert_eq!(h.session.phase(), SessionPhase::NotStarted);

        h.session.start();
        assert!(!h.session.start());

        h.session.toggle_pause();
        assert_eq!(h.session.advance(), None);
        assert_eq!(h.session.complete(false), None);
        assert!(h.session.splits().is_empty());
    }

    #[test]
    fn test_pause_excludes_paused_time() {
        let mut h = harness(&plan(2, None));
        h.session.start();

        h.clock.advance(Duration::from_secs(10));
        h.session.tick();
        assert_eq!(h.session.elapsed_seconds(), 10.0);

        assert!(h.session.toggle_pause());
        h.clock.advance(Duration::from_secs(120));
        h.session.tick();
        assert_eq!(h.session.elapsed_seconds(), 10.0);

        assert!(h.session.toggle_pause());
        h.clock.advance(Duration::from_secs(5));
        h.session.tick();
        assert!((h.session.elapsed_seconds() - 15.0).abs() < 1e-9);

        h.session.advance();
        assert!((h.session.splits()[0].duration_seconds - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_pause_cycles() {
        let mut h = harness(&plan(1, None));
        h.session.start();

        for _ in 0..4 {
            h.clock.advance(Duration::from_secs(2));
            h.session.toggle_pause();
            h.clock.advance(Duration::from_secs(60));
            h.session.toggle_pause();
        }
        h.session.tick();

        assert!((h.session.elapsed_seconds() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_complete_early_saves_once() {
        let mut h = harness(&plan(3, None));
        h.session.start();
        h.clock.advance(Duration::from_secs(90));
        h.session.advance();

        let outcome = h.session.complete(true);
        assert!(matches!(outcome, Some(SessionOutcome::Saved(_))));
        assert_eq!(h.session.phase(), SessionPhase::Completed);

        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].early);
        assert_eq!(records[0].splits.len(), 1);
        assert_eq!(records[0].rounds_completed, 0);
        assert!((records[0].duration_minutes - 1.5).abs() < 1e-9);

        // Already terminal
        assert_eq!(h.session.complete(true), None);
        assert_eq!(h.sink.records().len(), 1);
    }

    #[test]
    fn test_end_early_never_saves() {
        let mut h = harness(&plan(3, None));
        h.session.start();
        h.session.advance();

        assert!(h.session.end_early());
        assert_eq!(h.session.phase(), SessionPhase::Ended);
        assert_eq!(h.session.outcome(), Some(&SessionOutcome::Discarded));
        assert!(h.sink.records().is_empty());
        assert_eq!(*h.metrics.stopped.lock().unwrap(), vec![SamplingOutcome::Discarded]);
    }

    #[test]
    fn test_end_early_from_paused() {
        let mut h = harness(&plan(3, None));
        h.session.start();
        h.session.toggle_pause();

        assert!(h.session.end_early());
        assert_eq!(h.session.phase(), SessionPhase::Ended);
        assert!(h.sink.records().is_empty());
    }

    #[test]
    fn test_persistence_failure_still_terminates() {
        let mut h = harness_with(
            &plan(1, None),
            MemorySink::failing("disk full"),
            SessionOptions::default(),
            false,
        );
        h.session.start();

        assert_eq!(h.session.advance(), Some(Advance::Completed));
        assert_eq!(h.session.phase(), SessionPhase::Completed);
        assert!(matches!(
            h.session.outcome(),
            Some(SessionOutcome::SaveFailed { error }) if error.contains("disk full")
        ));

        let reported = h.errors.0.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("disk full"));
        assert_eq!(*h.metrics.stopped.lock().unwrap(), vec![SamplingOutcome::Finished]);
    }

    #[test]
    fn test_sampling_stopped_exactly_once() {
        let mut h = harness(&plan(1, None));
        h.session.start();
        assert_eq!(*h.metrics.started.lock().unwrap(), 1);

        h.session.advance();
        h.session.teardown();
        h.session.end_early();
        drop(h.session);

        assert_eq!(*h.metrics.stopped.lock().unwrap(), vec![SamplingOutcome::Finished]);
    }

    #[test]
    fn test_teardown_before_start() {
        let mut h = harness(&plan(2, None));
        h.session.teardown();
        assert_eq!(h.session.phase(), SessionPhase::Ended);
        assert!(h.metrics.stopped.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_metrics_is_not_fatal() {
        let clock = Arc::new(ManualClock::new());
        let sink = MemorySink::new();
        let mut session = WorkoutSession::new(
            &plan(1, None),
            Collaborators {
                persistence: Box::new(sink.clone()),
                metrics: Box::new(NoMetrics),
                entitlement: Box::new(StaticEntitlement(false)),
                errors: Box::new(CollectingErrors::default()),
            },
            clock,
            SessionOptions::default(),
        );

        assert!(session.start());
        assert!(session.take_metric_stream().is_none());
        assert_eq!(session.advance(), Some(Advance::Completed));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn test_readings_update_zone_and_ignore_garbage() {
        let mut h = harness(&plan(1, None));
        h.session.start();

        h.session.record_reading(171.0);
        assert_eq!(h.session.heart_rate(), Some(171.0));
        assert_eq!(h.session.snapshot().heart_rate_zone, Some(HeartRateZone::Zone5));

        h.session.record_reading(f64::NAN);
        h.session.record_reading(-3.0);
        assert_eq!(h.session.heart_rate(), Some(171.0));

        h.session.metrics_lost("sensor disconnected");
        assert_eq!(h.session.heart_rate(), None);
        assert_eq!(h.session.phase(), SessionPhase::Running);
    }

    #[test]
    fn test_premium_wearable_records_heart_rate_summary() {
        let options = SessionOptions {
            device: DeviceProfile::Watch,
            max_heart_rate: 200,
        };
        let mut h = harness_with(&plan(1, None), MemorySink::new(), options, true);
        h.session.start();
        for bpm in [120.0, 150.0, 180.0] {
            h.session.record_reading(bpm);
        }
        h.session.advance();

        let summary = h.sink.records()[0].heart_rate.clone().unwrap();
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.min_bpm, 120.0);
        assert_eq!(summary.max_bpm, 180.0);
        assert!((summary.average_bpm - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_requires_premium_and_wearable() {
        let watch = SessionOptions {
            device: DeviceProfile::Watch,
            max_heart_rate: 200,
        };
        let mut free_watch = harness_with(&plan(1, None), MemorySink::new(), watch, false);
        free_watch.session.start();
        free_watch.session.record_reading(140.0);
        free_watch.session.advance();
        assert!(free_watch.sink.records()[0].heart_rate.is_none());

        let mut premium_phone =
            harness_with(&plan(1, None), MemorySink::new(), SessionOptions::default(), true);
        premium_phone.session.start();
        premium_phone.session.record_reading(140.0);
        premium_phone.session.advance();
        assert!(premium_phone.sink.records()[0].heart_rate.is_none());
    }

    #[test]
    fn test_metric_stream_is_handed_over_once() {
        let (tx, source) = ChannelMetrics::channel(4);
        let mut session = WorkoutSession::new(
            &plan(1, None),
            Collaborators {
                persistence: Box::new(MemorySink::new()),
                metrics: Box::new(source),
                entitlement: Box::new(StaticEntitlement(false)),
                errors: Box::new(CollectingErrors::default()),
            },
            Arc::new(ManualClock::new()),
            SessionOptions::default(),
        );
        session.start();

        let mut stream = session.take_metric_stream().unwrap();
        assert!(session.take_metric_stream().is_none());

        tx.try_send(MetricEvent::Reading(99.0)).unwrap();
        assert_eq!(stream.try_recv().unwrap(), MetricEvent::Reading(99.0));
    }

    #[test]
    fn test_snapshot_reflects_progress() {
        let mut h = harness(&plan(3, Some(2)));
        h.session.start();
        h.session.advance();

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Running);
        assert_eq!(snapshot.step_index, 1);
        assert_eq!(snapshot.step_name.as_deref(), Some("step 1"));
        assert_eq!(snapshot.total_steps, 3);
        assert_eq!(snapshot.total_rounds, 2);
        assert_eq!(snapshot.splits_recorded, 1);
    }
}
