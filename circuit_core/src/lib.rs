#![forbid(unsafe_code)]

//! Core domain model and session engine for the Circuit workout system.
//!
//! This crate provides:
//! - Domain types (plans, steps, splits, completion records)
//! - The workout session state machine and its async runner
//! - Collaborator contracts (persistence, metrics, entitlement, errors)
//! - Persistence (JSONL history, CSV export)
//! - Progress statistics
//! - Plan files and the built-in catalog

pub mod types;
pub mod error;
pub mod clock;
pub mod collaborators;
pub mod session;
pub mod runner;
pub mod config;
pub mod logging;
pub mod plan;
pub mod catalog;
pub mod history;
pub mod export;
pub mod stats;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    ChannelMetrics, EntitlementCheck, ErrorSink, LogErrorSink, MemorySink, MetricEvent,
    MetricStream, MetricsSource, NoMetrics, PersistenceSink, SamplingOutcome, SimulatedHeartRate,
    StaticEntitlement,
};
pub use session::{Advance, Collaborators, SessionOptions, SessionOutcome, WorkoutSession};
pub use runner::{spawn_session, RunnerOptions, SessionCommand, SessionController, SessionHandle};
pub use config::Config;
pub use catalog::{find_plan, get_default_catalog};
pub use history::{read_history, JsonlHistory};
pub use export::export_csv;
pub use stats::{summarize, ProgressStats};
