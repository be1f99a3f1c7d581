//! Time utilities and timing constants for the rate pipeline.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Pipeline timing constants.
pub mod constants {
    use super::Duration;

    /// Minimum polling interval for a stream (60 seconds).
    /// Smaller requested intervals are raised to this value.
    pub const MIN_STREAM_INTERVAL_SECS: u64 = 60;

    /// Default polling interval when none is configured (60 seconds).
    pub fn default_stream_interval() -> Duration {
        Duration::from_secs(MIN_STREAM_INTERVAL_SECS)
    }

    /// Upper bound on the failure backoff delay (60 seconds).
    pub fn max_backoff() -> Duration {
        Duration::from_secs(60)
    }

    /// Largest exponent used when doubling the backoff delay.
    pub const MAX_BACKOFF_EXPONENT: u32 = 6;

    /// Consumer poll timeout (1 second).
    pub fn consumer_poll_timeout() -> Duration {
        Duration::from_secs(1)
    }

    /// Delay before resubscribing after an unknown-topic error (5 seconds).
    pub fn unknown_topic_retry_delay() -> Duration {
        Duration::from_secs(5)
    }

    /// Delay after any other consume error (2 seconds).
    pub fn consume_error_delay() -> Duration {
        Duration::from_secs(2)
    }

    /// Per-message delivery timeout (30 seconds).
    pub fn send_timeout() -> Duration {
        Duration::from_secs(30)
    }

    /// Producer retry backoff (200 milliseconds).
    pub fn producer_retry_backoff() -> Duration {
        Duration::from_millis(200)
    }

    /// Producer batching linger (5 milliseconds).
    pub fn producer_linger() -> Duration {
        Duration::from_millis(5)
    }

    /// Flush budget on shutdown (5 seconds).
    pub fn flush_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Outbound provider request timeout (30 seconds).
    pub fn provider_request_timeout() -> Duration {
        Duration::from_secs(30)
    }

    /// How long stream tasks get to finish after cancellation (10 seconds).
    pub fn stream_drain_timeout() -> Duration {
        Duration::from_secs(10)
    }

    /// Lookback window for the last-package query (24 hours).
    pub fn last_package_window() -> chrono::Duration {
        chrono::Duration::hours(24)
    }
}

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a timestamp falls inside the trailing window ending now.
pub fn is_within(timestamp: Timestamp, window: chrono::Duration) -> bool {
    timestamp >= now() - window
}

/// Clamp a requested polling interval to the minimum.
pub fn clamp_stream_interval(requested_secs: u64) -> Duration {
    Duration::from_secs(requested_secs.max(constants::MIN_STREAM_INTERVAL_SECS))
}
