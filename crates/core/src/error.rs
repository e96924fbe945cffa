use thiserror::Error;

/// Reasons a rule definition is rejected at creation or update time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("{field} must be between 1 and 10, got {value}")]
    SeverityOutOfRange { field: &'static str, value: i32 },

    #[error("min_severity ({min}) is greater than max_severity ({max})")]
    InvertedSeverityRange { min: i32, max: i32 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i32 },

    #[error("cooldown_minutes must not be negative, got {0}")]
    NegativeCooldown(i32),
}
