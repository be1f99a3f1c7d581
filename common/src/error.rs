//! Error types shared across the pipeline.

use thiserror::Error;

/// Errors raised while constructing model values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// A currency code was empty or contained non-alphanumeric characters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// A rate was zero or negative.
    #[error("Invalid rate {rate} for {from}/{to}: rate must be positive")]
    NonPositiveRate {
        from: String,
        to: String,
        rate: String,
    },

    /// An identifier could not be parsed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl CommonError {
    /// Get error code for structured logging and control outcomes.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidCurrency(_) => "INVALID_CURRENCY",
            CommonError::NonPositiveRate { .. } => "NON_POSITIVE_RATE",
            CommonError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
        }
    }
}

/// Result type alias for model construction.
pub type Result<T> = std::result::Result<T, CommonError>;
