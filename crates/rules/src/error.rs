//! Error types for rule evaluation.

use std::time::Duration;

use thiserror::Error;

/// A stored rule whose filters cannot be turned into a query.
///
/// Only the offending rule is skipped; the pass continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{field} must be between 1 and 10, got {value}")]
    SeverityOutOfRange { field: &'static str, value: i32 },

    #[error("min_severity ({min}) is greater than max_severity ({max})")]
    InvertedSeverityRange { min: i32, max: i32 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i32 },

    #[error("cooldown_minutes must not be negative, got {0}")]
    NegativeCooldown(i32),

    #[error("{field} of {minutes} minutes leaves the representable time range")]
    TimeOutOfRange { field: &'static str, minutes: i32 },
}

/// Failures of the backing stores.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call `{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// Pass-level failures returned to whoever invoked the pass.
#[derive(Error, Debug, Clone)]
pub enum EvaluationError {
    #[error("evaluation aborted, {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("an evaluation pass is already running")]
    PassInProgress,
}
