//! Metrics collection for the producer pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pipeline metrics.
pub struct PipelineMetrics {
    /// Fetch-and-publish cycles started.
    pub cycles_total: AtomicU64,
    /// Cycles that failed and entered backoff.
    pub cycles_failed: AtomicU64,
    /// Packages published.
    pub packages_published: AtomicU64,
    /// Cycles that fetched zero rates and published nothing.
    pub packages_skipped_empty: AtomicU64,
    /// Individual pair fetch failures.
    pub pair_fetch_failures: AtomicU64,
    /// Live streams.
    pub streams_active: AtomicU64,
}

impl PipelineMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            packages_published: AtomicU64::new(0),
            packages_skipped_empty: AtomicU64::new(0),
            pair_fetch_failures: AtomicU64::new(0),
            streams_active: AtomicU64::new(0),
        }
    }

    /// Increment cycles started.
    pub fn cycle_started(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed cycle.
    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published package.
    pub fn package_published(&self) {
        self.packages_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an empty package that was not published.
    pub fn package_skipped(&self) {
        self.packages_skipped_empty.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a single pair fetch failure.
    pub fn pair_fetch_failed(&self) {
        self.pair_fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Set live stream count.
    pub fn set_streams_active(&self, count: u64) {
        self.streams_active.store(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            packages_published: self.packages_published.load(Ordering::Relaxed),
            packages_skipped_empty: self.packages_skipped_empty.load(Ordering::Relaxed),
            pair_fetch_failures: self.pair_fetch_failures.load(Ordering::Relaxed),
            streams_active: self.streams_active.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP ratestream_cycles_total Total fetch-and-publish cycles
# TYPE ratestream_cycles_total counter
ratestream_cycles_total {}

# HELP ratestream_cycles_failed Total failed cycles
# TYPE ratestream_cycles_failed counter
ratestream_cycles_failed {}

# HELP ratestream_packages_published Total packages published
# TYPE ratestream_packages_published counter
ratestream_packages_published {}

# HELP ratestream_packages_skipped_empty Total empty packages not published
# TYPE ratestream_packages_skipped_empty counter
ratestream_packages_skipped_empty {}

# HELP ratestream_pair_fetch_failures Total individual pair fetch failures
# TYPE ratestream_pair_fetch_failures counter
ratestream_pair_fetch_failures {}

# HELP ratestream_streams_active Current live streams
# TYPE ratestream_streams_active gauge
ratestream_streams_active {}
"#,
            snapshot.cycles_total,
            snapshot.cycles_failed,
            snapshot.packages_published,
            snapshot.packages_skipped_empty,
            snapshot.pair_fetch_failures,
            snapshot.streams_active,
        )
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles_total: u64,
    pub cycles_failed: u64,
    pub packages_published: u64,
    pub packages_skipped_empty: u64,
    pub pair_fetch_failures: u64,
    pub streams_active: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<PipelineMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = PipelineMetrics::new();

        metrics.cycle_started();
        metrics.cycle_started();
        metrics.cycle_failed();
        metrics.package_published();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_total, 2);
        assert_eq!(snapshot.cycles_failed, 1);
        assert_eq!(snapshot.packages_published, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = PipelineMetrics::new();
        metrics.package_skipped();
        metrics.set_streams_active(3);

        let output = metrics.to_prometheus();
        assert!(output.contains("ratestream_packages_skipped_empty 1"));
        assert!(output.contains("ratestream_streams_active 3"));
    }
}
