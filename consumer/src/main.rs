//! RateStream Consumer Binary
//!
//! Keeps the latest exchange rate package from the broker in memory.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratestream_broker::{BrokerEndpoint, MemoryBroker, MessageSubscriber, TopicAdmin};
use ratestream_consumer::{ConsumerConfig, LastPackageCache, PackageConsumer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsumerConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting RateStream consumer");

    // Validate configuration
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    if !config.run_mode.uses_broker() {
        info!(run_mode = %config.run_mode, "Consumer disabled for run mode");
        return Ok(());
    }

    let Some((subscriber, admin)) = connect(&config)? else {
        error!("Bootstrap servers not configured, consumer not started");
        return Ok(());
    };

    let cache = Arc::new(LastPackageCache::new());
    let mut consumer = PackageConsumer::new(config, subscriber, cache.clone()).with_admin(admin);
    let stats = consumer.stats();

    let token = CancellationToken::new();
    let consumer_token = token.clone();
    let handle = tokio::spawn(async move { consumer.run(consumer_token).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    token.cancel();
    handle.await?;

    if let Some(package) = cache.get() {
        info!(time = %package.time(), rates = package.len(), "Last cached package");
    }
    info!(stats = ?stats.snapshot(), "Consumer shutdown complete");
    Ok(())
}

type Clients = (Box<dyn MessageSubscriber>, Arc<dyn TopicAdmin>);

fn connect(config: &ConsumerConfig) -> anyhow::Result<Option<Clients>> {
    match BrokerEndpoint::parse(&config.bootstrap_servers) {
        Some(BrokerEndpoint::Memory) => {
            info!("Using in-process broker");
            let broker = MemoryBroker::bounded(MemoryBroker::DEFAULT_RETAINED_RECORDS);
            Ok(Some((
                Box::new(broker.subscriber(&config.settings())),
                Arc::new(broker),
            )))
        }
        #[cfg(feature = "kafka")]
        Some(BrokerEndpoint::Kafka(servers)) => {
            let subscriber = ratestream_broker::KafkaSubscriber::new(&config.settings())?;
            let admin = ratestream_broker::KafkaAdmin::new(&servers)?;
            Ok(Some((Box::new(subscriber), Arc::new(admin))))
        }
        #[cfg(not(feature = "kafka"))]
        Some(BrokerEndpoint::Kafka(servers)) => Err(anyhow::anyhow!(
            "Kafka servers {} configured but the kafka feature is disabled",
            servers
        )),
        None => Ok(None),
    }
}
