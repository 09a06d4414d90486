//! Error types for the circuit_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for circuit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workout plan validation error
    #[error("Plan validation error: {0}")]
    PlanValidation(String),

    /// Writing a completed workout to history failed
    #[error("Persistence error: {0}")]
    Persist(String),

    /// Live metric sampling could not be started
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// The session runner has already shut down
    #[error("Workout session is closed")]
    SessionClosed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}
