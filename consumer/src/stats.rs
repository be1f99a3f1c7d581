//! Consumer counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Consumer metrics.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    /// Packages decoded and cached.
    pub consumed: AtomicU64,
    /// Tombstones skipped.
    pub skipped: AtomicU64,
    /// Payloads that failed to decode.
    pub malformed: AtomicU64,
    /// Poll errors of any kind.
    pub errors: AtomicU64,
    /// Resubscribes after unknown-topic errors.
    pub resubscribes: AtomicU64,
}

impl ConsumerStats {
    /// Create new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resubscribe(&self) {
        self.resubscribes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current stats snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            consumed: self.consumed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            resubscribes: self.resubscribes.load(Ordering::Relaxed),
        }
    }

    /// Export stats in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP ratestream_consumer_consumed Packages decoded and cached
# TYPE ratestream_consumer_consumed counter
ratestream_consumer_consumed {}

# HELP ratestream_consumer_skipped Tombstone records skipped
# TYPE ratestream_consumer_skipped counter
ratestream_consumer_skipped {}

# HELP ratestream_consumer_malformed Payloads that failed to decode
# TYPE ratestream_consumer_malformed counter
ratestream_consumer_malformed {}

# HELP ratestream_consumer_errors Poll errors
# TYPE ratestream_consumer_errors counter
ratestream_consumer_errors {}

# HELP ratestream_consumer_resubscribes Resubscribes after unknown-topic errors
# TYPE ratestream_consumer_resubscribes counter
ratestream_consumer_resubscribes {}
"#,
            snapshot.consumed,
            snapshot.skipped,
            snapshot.malformed,
            snapshot.errors,
            snapshot.resubscribes,
        )
    }
}

/// Snapshot of consumer stats at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub consumed: u64,
    pub skipped: u64,
    pub malformed: u64,
    pub errors: u64,
    pub resubscribes: u64,
}

/// Shared stats instance.
pub type SharedStats = Arc<ConsumerStats>;
