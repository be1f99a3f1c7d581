//! Producer-side error types.

use std::time::Duration;

use ratestream_broker::BrokerError;
use ratestream_common::StreamId;
use ratestream_protocol::WireError;
use ratestream_store::StoreError;
use thiserror::Error;

/// A fetch cycle could not produce a package.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No pairs were requested.
    #[error("At least one currency pair is required")]
    EmptyRequest,

    /// The assembled package could not be persisted.
    #[error("Failed to persist package: {0}")]
    Store(#[from] StoreError),
}

/// A package could not be published.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The package could not be encoded.
    #[error("Failed to encode package: {0}")]
    Encode(#[from] WireError),

    /// The broker did not acknowledge in time.
    #[error("Broker did not acknowledge within {0:?}")]
    Timeout(Duration),

    /// The client refused the record after its own retries.
    #[error("Broker backpressure: {0}")]
    Backpressure(String),

    /// Any other broker failure.
    #[error("Broker rejected package: {0}")]
    Broker(BrokerError),
}

impl From<BrokerError> for PublishError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Backpressure(reason) => PublishError::Backpressure(reason),
            other => PublishError::Broker(other),
        }
    }
}

/// Stream lifecycle and cycle errors.
#[derive(Error, Debug)]
pub enum StreamError {
    /// A stream needs at least one pair.
    #[error("A stream needs at least one currency pair")]
    NoPairs,

    /// A live stream already uses the id.
    #[error("Stream id already registered: {0}")]
    IdCollision(StreamId),

    /// The manager is shutting down.
    #[error("Stream manager is shutting down")]
    ShuttingDown,

    /// The fetch half of a cycle failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The publish half of a cycle failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl StreamError {
    /// Get error code for structured logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::NoPairs => "NO_PAIRS",
            StreamError::IdCollision(_) => "STREAM_ID_COLLISION",
            StreamError::ShuttingDown => "SHUTTING_DOWN",
            StreamError::Fetch(FetchError::EmptyRequest) => "EMPTY_REQUEST",
            StreamError::Fetch(FetchError::Store(_)) => "STORE_FAILURE",
            StreamError::Publish(PublishError::Encode(_)) => "ENCODE_FAILURE",
            StreamError::Publish(PublishError::Timeout(_)) => "PUBLISH_TIMEOUT",
            StreamError::Publish(PublishError::Backpressure(_)) => "PUBLISH_BACKPRESSURE",
            StreamError::Publish(PublishError::Broker(_)) => "PUBLISH_FAILURE",
        }
    }
}

/// Control-surface errors, reported to callers as structured outcomes.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Streams need the broker pipeline.
    #[error("Streams are only available in broker mode")]
    NotBrokerMode,

    /// Caller input was unusable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Stream lifecycle failure.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Direct fetch failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Read query failure, including "not found".
    #[error(transparent)]
    Query(#[from] StoreError),
}

impl ControlError {
    /// Get error code for structured outcomes.
    pub fn error_code(&self) -> &'static str {
        match self {
            ControlError::NotBrokerMode => "NOT_BROKER_MODE",
            ControlError::InvalidRequest(_) => "INVALID_REQUEST",
            ControlError::Stream(e) => e.error_code(),
            ControlError::Fetch(FetchError::EmptyRequest) => "EMPTY_REQUEST",
            ControlError::Fetch(FetchError::Store(e)) => e.error_code(),
            ControlError::Query(e) => e.error_code(),
        }
    }

    /// Check if this is a "nothing matched" outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlError::Query(StoreError::NotFound(_)))
    }
}
