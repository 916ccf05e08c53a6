use thiserror::Error;

use crate::types::ExerciseType;

/// Movement analysis error types
///
/// Every variant is recoverable at the caller boundary and maps to a
/// user-facing, retryable condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Frame series is empty")]
    EmptySeries,

    #[error("No person detected: {0}")]
    NoPersonDetected(String),

    #[error("Insufficient motion: {0}")]
    InsufficientMotion(String),

    #[error("Exercise mismatch: expected '{expected}', detected '{detected}'")]
    ExerciseMismatch {
        expected: String,
        detected: ExerciseType,
        confidence: f64,
    },

    #[error("Invalid frame series: {0}")]
    InvalidSeries(String),

    #[error("Analysis worker failed: {0}")]
    WorkerFailed(String),
}

/// Threshold configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for analysis operations
pub type AResult<T> = Result<T, AnalysisError>;
