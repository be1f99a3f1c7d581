//! Failure backoff for stream loops.

use std::time::Duration;

use ratestream_common::constants;

/// Exponential backoff keyed on consecutive failures.
///
/// The delay for the n-th consecutive failure is `2^min(n, 6)` seconds,
/// capped at the maximum backoff, so the sequence runs 2, 4, 8, 16, 32, 60.
#[derive(Debug, Default, Clone)]
pub struct FailureBackoff {
    consecutive_failures: u32,
}

impl FailureBackoff {
    /// Create a backoff with no recorded failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let exponent = self.consecutive_failures.min(constants::MAX_BACKOFF_EXPONENT);
        Duration::from_secs(1u64 << exponent).min(constants::max_backoff())
    }

    /// Clear the failure count after a successful cycle.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }
}
