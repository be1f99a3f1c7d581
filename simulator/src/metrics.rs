//! Simulation report.

use std::sync::Arc;

use ratestream_common::ExchangePackage;
use ratestream_consumer::StatsSnapshot;
use ratestream_producer::MetricsSnapshot;

/// End-of-run summary across both halves of the pipeline.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Producer-side counters.
    pub pipeline: MetricsSnapshot,
    /// Consumer-side counters.
    pub consumer: StatsSnapshot,
    /// What the cache held when the run ended.
    pub last_package: Option<Arc<ExchangePackage>>,
}

impl SimulationReport {
    /// Share of started cycles that published a package.
    pub fn publish_rate(&self) -> f64 {
        if self.pipeline.cycles_total == 0 {
            return 0.0;
        }
        self.pipeline.packages_published as f64 / self.pipeline.cycles_total as f64
    }

    /// Published packages the consumer has not cached yet.
    pub fn consumer_lag(&self) -> u64 {
        self.pipeline
            .packages_published
            .saturating_sub(self.consumer.consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(cycles: u64, published: u64, consumed: u64) -> SimulationReport {
        SimulationReport {
            pipeline: MetricsSnapshot {
                cycles_total: cycles,
                cycles_failed: 0,
                packages_published: published,
                packages_skipped_empty: cycles - published,
                pair_fetch_failures: 0,
                streams_active: 0,
            },
            consumer: StatsSnapshot {
                consumed,
                ..StatsSnapshot::default()
            },
            last_package: None,
        }
    }

    #[test]
    fn test_report_ratios() {
        let report = report(4, 3, 2);
        assert_eq!(report.publish_rate(), 0.75);
        assert_eq!(report.consumer_lag(), 1);
    }

    #[test]
    fn test_empty_report() {
        let report = report(0, 0, 0);
        assert_eq!(report.publish_rate(), 0.0);
        assert_eq!(report.consumer_lag(), 0);
    }
}
