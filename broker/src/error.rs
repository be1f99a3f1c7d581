//! Broker error types.

use thiserror::Error;

/// Errors raised by broker clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The topic or partition does not exist (yet).
    #[error("Unknown topic or partition: {0}")]
    UnknownTopicOrPartition(String),

    /// The broker did not acknowledge in time.
    #[error("Broker operation timed out: {0}")]
    Timeout(String),

    /// The client's local queue is full.
    #[error("Broker backpressure: {0}")]
    Backpressure(String),

    /// Network or protocol failure.
    #[error("Broker transport error: {0}")]
    Transport(String),

    /// Client could not be created from its settings.
    #[error("Broker configuration error: {0}")]
    Configuration(String),

    /// Topic administration failed.
    #[error("Topic administration failed for {topic}: {reason}")]
    Admin { topic: String, reason: String },

    /// The client was closed.
    #[error("Broker client closed")]
    Closed,
}

impl BrokerError {
    /// Get error code for structured logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            BrokerError::UnknownTopicOrPartition(_) => "UNKNOWN_TOPIC_OR_PART",
            BrokerError::Timeout(_) => "BROKER_TIMEOUT",
            BrokerError::Backpressure(_) => "BROKER_BACKPRESSURE",
            BrokerError::Transport(_) => "BROKER_TRANSPORT",
            BrokerError::Configuration(_) => "BROKER_CONFIGURATION",
            BrokerError::Admin { .. } => "BROKER_ADMIN",
            BrokerError::Closed => "BROKER_CLOSED",
        }
    }

    /// The only condition that calls for an explicit resubscribe.
    pub fn is_unknown_topic(&self) -> bool {
        matches!(self, BrokerError::UnknownTopicOrPartition(_))
    }

    /// Check if a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::UnknownTopicOrPartition(_)
                | BrokerError::Timeout(_)
                | BrokerError::Backpressure(_)
                | BrokerError::Transport(_)
        )
    }
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let unknown = BrokerError::UnknownTopicOrPartition("rates".into());
        assert!(unknown.is_unknown_topic());
        assert!(unknown.is_retryable());

        assert!(!BrokerError::Closed.is_retryable());
        assert!(!BrokerError::Configuration("x".into()).is_retryable());
        assert!(BrokerError::Backpressure("queue full".into()).is_retryable());
        assert!(!BrokerError::Timeout("send".into()).is_unknown_topic());
    }
}
