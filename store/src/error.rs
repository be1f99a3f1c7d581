//! Store error types.

use thiserror::Error;

/// Errors raised by package stores and read queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not complete the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A query matched nothing.
    #[error("{0} not found")]
    NotFound(String),

    /// A query was called with unusable arguments.
    #[error("Invalid query argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Get error code for structured logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
