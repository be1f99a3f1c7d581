//! RateStream Producer Binary
//!
//! Streams exchange rate packages from the configured provider to the broker.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratestream_broker::{BrokerEndpoint, MemoryBroker, MessagePublisher};
use ratestream_producer::{
    PackageProducer, PipelineMetrics, ProducerConfig, RateFetchOrchestrator, RateStreamService,
};
use ratestream_providers::RateProviderClient;
use ratestream_store::{InMemoryPackageStore, PackageQueries};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ProducerConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting RateStream producer");

    // Validate configuration
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let client = RateProviderClient::from_settings(&config.providers)?;
    info!(provider = client.provider_name(), "Provider selected");

    let store = Arc::new(InMemoryPackageStore::bounded(
        InMemoryPackageStore::DEFAULT_RETAINED_PACKAGES,
    ));
    let metrics = Arc::new(PipelineMetrics::new());
    let orchestrator = Arc::new(RateFetchOrchestrator::new(
        Arc::new(client),
        store.clone(),
        config.max_parallelism,
        metrics.clone(),
    ));
    let queries = PackageQueries::new(store);

    let service = if config.run_mode.uses_broker() {
        let publisher = connect_publisher(&config.bootstrap_servers)?;
        let producer = Arc::new(PackageProducer::new(publisher, config.topic.clone()));
        RateStreamService::broker(orchestrator, producer, queries, metrics.clone())
    } else {
        RateStreamService::direct(orchestrator, queries)
    };

    let instance = service.instance();
    info!(
        instance_id = %instance.instance_id,
        pid = instance.pid,
        run_mode = %service.run_mode(),
        topic = %config.topic,
        "Producer running"
    );

    let pairs = config.boot_pairs()?;
    if !pairs.is_empty() {
        match service.start_stream(pairs, Some(config.stream_interval_secs)) {
            Ok(started) => info!(
                stream_id = %started.stream_id,
                interval_seconds = started.interval_seconds,
                "Boot stream started"
            ),
            Err(e) => error!(error_code = e.error_code(), error = %e, "Boot stream refused"),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    for stream in service.stream_details() {
        info!(
            stream_id = %stream.stream_id,
            pairs = stream.pairs.len(),
            consecutive_failures = stream.consecutive_failures,
            started_at = %stream.started_at,
            "Stopping stream"
        );
    }
    service.shutdown().await;
    info!(metrics = ?metrics.snapshot(), "Producer shutdown complete");
    Ok(())
}

fn connect_publisher(bootstrap_servers: &str) -> anyhow::Result<Arc<dyn MessagePublisher>> {
    match BrokerEndpoint::parse(bootstrap_servers) {
        Some(BrokerEndpoint::Memory) => {
            info!("Using in-process broker");
            Ok(Arc::new(MemoryBroker::bounded(MemoryBroker::DEFAULT_RETAINED_RECORDS)))
        }
        #[cfg(feature = "kafka")]
        Some(BrokerEndpoint::Kafka(servers)) => {
            let settings = ratestream_broker::ProducerSettings::new(servers);
            settings.validate().map_err(|e| anyhow::anyhow!(e))?;
            Ok(Arc::new(ratestream_broker::KafkaPublisher::new(&settings)?))
        }
        #[cfg(not(feature = "kafka"))]
        Some(BrokerEndpoint::Kafka(servers)) => Err(anyhow::anyhow!(
            "Kafka servers {} configured but the kafka feature is disabled",
            servers
        )),
        None => Err(anyhow::anyhow!("Bootstrap servers cannot be empty")),
    }
}
