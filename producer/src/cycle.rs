//! One fetch-and-publish cycle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use ratestream_common::{CurrencyPair, PackageId};

use crate::error::StreamError;
use crate::metrics::SharedMetrics;
use crate::orchestrator::RateFetchOrchestrator;
use crate::publisher::PackageProducer;

/// What a completed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A package was published.
    Published {
        package_id: Option<PackageId>,
        rates: usize,
    },
    /// Every pair failed; nothing was published.
    SkippedEmpty,
}

/// The unit of work a stream loop repeats.
#[async_trait]
pub trait StreamCycle: Send + Sync {
    /// Run a single cycle for the given pairs.
    async fn produce_once(&self, pairs: &[CurrencyPair]) -> Result<CycleOutcome, StreamError>;
}

/// Fetches through the orchestrator and publishes non-empty packages.
pub struct PublishingCycle {
    orchestrator: Arc<RateFetchOrchestrator>,
    producer: Arc<PackageProducer>,
    metrics: SharedMetrics,
}

impl PublishingCycle {
    pub fn new(
        orchestrator: Arc<RateFetchOrchestrator>,
        producer: Arc<PackageProducer>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            orchestrator,
            producer,
            metrics,
        }
    }
}

#[async_trait]
impl StreamCycle for PublishingCycle {
    async fn produce_once(&self, pairs: &[CurrencyPair]) -> Result<CycleOutcome, StreamError> {
        let package = self.orchestrator.document_package(pairs).await?;

        if package.is_empty() {
            self.metrics.package_skipped();
            warn!(
                package_id = ?package.id(),
                pairs = pairs.len(),
                "Fetch cycle returned no rates, nothing published"
            );
            return Ok(CycleOutcome::SkippedEmpty);
        }

        self.producer.publish(&package).await?;
        self.metrics.package_published();

        Ok(CycleOutcome::Published {
            package_id: package.id(),
            rates: package.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::metrics::PipelineMetrics;
    use ratestream_broker::MemoryBroker;
    use ratestream_providers::{MockRateSource, ProviderFailure};
    use ratestream_store::InMemoryPackageStore;
    use rust_decimal_macros::dec;

    const TOPIC: &str = "exchange-packages";

    fn pair(from: &str, to: &str) -> CurrencyPair {
        CurrencyPair::from_codes(from, to).unwrap()
    }

    fn cycle(source: Arc<MockRateSource>, broker: &MemoryBroker) -> (PublishingCycle, SharedMetrics) {
        let metrics = Arc::new(PipelineMetrics::new());
        let orchestrator = Arc::new(RateFetchOrchestrator::new(
            source,
            Arc::new(InMemoryPackageStore::new()),
            4,
            metrics.clone(),
        ));
        let producer = Arc::new(PackageProducer::new(Arc::new(broker.clone()), TOPIC));
        (
            PublishingCycle::new(orchestrator, producer, metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_publishes_non_empty_package() {
        let source = Arc::new(MockRateSource::new("mock"));
        source.set_rate(pair("USD", "EUR"), dec!(0.92));
        let broker = MemoryBroker::new();
        let (cycle, metrics) = cycle(source, &broker);

        let outcome = cycle.produce_once(&[pair("USD", "EUR")]).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Published { rates: 1, .. }));
        assert_eq!(broker.topic_len(TOPIC), 1);
        assert_eq!(metrics.snapshot().packages_published, 1);
    }

    #[tokio::test]
    async fn test_empty_package_is_skipped_not_failed() {
        let source = Arc::new(MockRateSource::new("mock"));
        source.fail_pair(pair("USD", "EUR"), ProviderFailure::Status(503));
        let broker = MemoryBroker::new();
        let (cycle, metrics) = cycle(source, &broker);

        let outcome = cycle.produce_once(&[pair("USD", "EUR")]).await.unwrap();
        assert_eq!(outcome, CycleOutcome::SkippedEmpty);
        assert_eq!(broker.topic_len(TOPIC), 0);
        assert_eq!(metrics.snapshot().packages_skipped_empty, 1);
    }

    #[tokio::test]
    async fn test_empty_request_is_an_error() {
        let source = Arc::new(MockRateSource::new("mock"));
        let broker = MemoryBroker::new();
        let (cycle, _) = cycle(source, &broker);

        assert!(matches!(
            cycle.produce_once(&[]).await,
            Err(StreamError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_error_propagates() {
        let source = Arc::new(MockRateSource::new("mock"));
        source.set_rate(pair("USD", "EUR"), dec!(0.92));
        let broker = MemoryBroker::strict();
        let (cycle, _) = cycle(source, &broker);

        assert!(matches!(
            cycle.produce_once(&[pair("USD", "EUR")]).await,
            Err(StreamError::Publish(PublishError::Broker(_)))
        ));
    }
}
