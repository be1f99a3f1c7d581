//! Simulation controller.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ratestream_broker::{ConsumerSettings, MemoryBroker, DEFAULT_TOPIC};
use ratestream_common::{ExchangePackage, StreamId};
use ratestream_consumer::{ConsumerConfig, LastPackageCache, PackageConsumer, SharedCache};
use ratestream_producer::{
    PackageProducer, PipelineMetrics, RateFetchOrchestrator, RateStreamService, SharedMetrics,
    StreamStarted, DEFAULT_MAX_PARALLELISM,
};
use ratestream_providers::RateSource;
use ratestream_store::{InMemoryPackageStore, PackageQueries};

use crate::metrics::SimulationReport;

const MEMORY_SERVERS: &str = "memory://";

/// Runs the producer and the consumer in one process over an in-process broker.
pub struct SimulationController {
    service: RateStreamService,
    consumer: PackageConsumer,
    cache: SharedCache,
    metrics: SharedMetrics,
}

impl SimulationController {
    /// Wire the pipeline around a rate source.
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        let broker = MemoryBroker::bounded(MemoryBroker::DEFAULT_RETAINED_RECORDS);
        let store = Arc::new(InMemoryPackageStore::bounded(
            InMemoryPackageStore::DEFAULT_RETAINED_PACKAGES,
        ));
        let metrics = Arc::new(PipelineMetrics::new());

        let orchestrator = Arc::new(RateFetchOrchestrator::new(
            source,
            store.clone(),
            DEFAULT_MAX_PARALLELISM,
            metrics.clone(),
        ));
        let producer = Arc::new(PackageProducer::new(Arc::new(broker.clone()), DEFAULT_TOPIC));
        let service = RateStreamService::broker(
            orchestrator,
            producer,
            PackageQueries::new(store),
            metrics.clone(),
        );

        let config = ConsumerConfig {
            bootstrap_servers: MEMORY_SERVERS.to_string(),
            ..ConsumerConfig::default()
        };
        let cache = Arc::new(LastPackageCache::new());
        let subscriber = broker.subscriber(&ConsumerSettings::new(MEMORY_SERVERS));
        let consumer = PackageConsumer::new(config, Box::new(subscriber), cache.clone())
            .with_admin(Arc::new(broker));

        Self {
            service,
            consumer,
            cache,
            metrics,
        }
    }

    /// Start a stream.
    pub fn start_stream(&self, pairs: &str, interval_secs: u64) -> anyhow::Result<StreamStarted> {
        let pairs = ratestream_common::parse_pair_list(pairs)?;
        let started = self
            .service
            .start_stream(pairs, Some(interval_secs))
            .map_err(|e| anyhow::anyhow!("{}: {}", e.error_code(), e))?;
        info!(
            stream_id = %started.stream_id,
            interval_seconds = started.interval_seconds,
            "Simulation stream started"
        );
        Ok(started)
    }

    /// Live stream ids.
    pub fn streams(&self) -> Vec<StreamId> {
        self.service.list_streams()
    }

    /// Run until `duration` elapses, or until Ctrl+C when none is given,
    /// reporting the cached package every `report_every`.
    pub async fn run(
        self,
        duration: Option<Duration>,
        report_every: Duration,
    ) -> anyhow::Result<SimulationReport> {
        let Self {
            service,
            mut consumer,
            cache,
            metrics,
        } = self;
        let stats = consumer.stats();

        let token = CancellationToken::new();
        let consumer_token = token.clone();
        let consumer_task = tokio::spawn(async move {
            consumer.run(consumer_token).await;
        });

        let reporter_token = token.clone();
        let reporter_cache = cache.clone();
        let reporter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(report_every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = reporter_token.cancelled() => break,
                    _ = ticker.tick() => report(reporter_cache.get().as_deref()),
                }
            }
        });

        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => {
                tokio::signal::ctrl_c().await?;
                info!("Shutdown signal received");
            }
        }

        service.shutdown().await;
        token.cancel();
        if let Err(e) = consumer_task.await {
            warn!(error = %e, "Consumer task ended abnormally");
        }
        if let Err(e) = reporter.await {
            warn!(error = %e, "Reporter task ended abnormally");
        }

        Ok(SimulationReport {
            pipeline: metrics.snapshot(),
            consumer: stats.snapshot(),
            last_package: cache.get(),
        })
    }
}

fn report(package: Option<&ExchangePackage>) {
    let Some(package) = package else {
        info!("No package cached yet");
        return;
    };

    info!(time = %package.time(), rates = package.len(), "Cached package");
    for rate in package.rates() {
        info!("  {} = {}", rate.pair(), rate.rate());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RandomWalkSource;

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_end_to_end() {
        let controller = SimulationController::new(Arc::new(RandomWalkSource::new(
            Some(3),
            0.002,
            0.0,
        )));
        controller.start_stream("USD:EUR,GBP:JPY", 60).unwrap();
        assert_eq!(controller.streams().len(), 1);

        let report = controller
            .run(Some(Duration::from_secs(130)), Duration::from_secs(30))
            .await
            .unwrap();

        // Cycles at 0s, 60s and 120s.
        assert_eq!(report.pipeline.packages_published, 3);
        assert_eq!(report.consumer.consumed, 3);
        assert_eq!(report.consumer_lag(), 0);
        assert_eq!(report.last_package.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_publishes_nothing() {
        let controller = SimulationController::new(Arc::new(RandomWalkSource::new(
            Some(3),
            0.002,
            1.0,
        )));
        controller.start_stream("USD:EUR", 60).unwrap();

        let report = controller
            .run(Some(Duration::from_secs(70)), Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(report.pipeline.packages_published, 0);
        assert_eq!(report.pipeline.packages_skipped_empty, 2);
        assert!(report.last_package.is_none());
    }

    #[test]
    fn test_bad_pairs_rejected() {
        let controller = SimulationController::new(Arc::new(RandomWalkSource::new(
            Some(3),
            0.002,
            0.0,
        )));
        assert!(controller.start_stream("USD", 60).is_err());
        assert!(controller.start_stream("", 60).is_err());
    }
}
