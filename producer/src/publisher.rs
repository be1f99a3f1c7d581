//! Package publishing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use ratestream_broker::{DeliveryReceipt, MessagePublisher};
use ratestream_common::{constants, ExchangePackage, MessageKey};
use ratestream_protocol::encode_package;

use crate::error::PublishError;

/// Encodes packages and publishes them to the configured topic.
///
/// Each publish carries a fresh opaque key. The broker's own delivery
/// guarantees come from the client settings; this type only bounds how
/// long a caller waits for the acknowledgement.
pub struct PackageProducer {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
    send_timeout: Duration,
}

impl PackageProducer {
    /// Create a producer with the default send timeout.
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            send_timeout: constants::send_timeout(),
        }
    }

    /// Override the send timeout.
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Topic this producer writes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a package and wait for the acknowledgement.
    #[instrument(skip(self, package), fields(topic = %self.topic, rates = package.len()))]
    pub async fn publish(&self, package: &ExchangePackage) -> Result<DeliveryReceipt, PublishError> {
        let payload = encode_package(package)?;
        let key = MessageKey::generate();

        let receipt = tokio::time::timeout(
            self.send_timeout,
            self.publisher.publish(&self.topic, key.as_str(), &payload),
        )
        .await
        .map_err(|_| PublishError::Timeout(self.send_timeout))??;

        info!(
            key = %key,
            partition = receipt.partition,
            offset = receipt.offset,
            package_id = ?package.id(),
            "Package published"
        );
        Ok(receipt)
    }

    /// Flush buffered records before shutdown. Failures are logged only.
    pub async fn shutdown(&self) {
        match self.publisher.flush(constants::flush_timeout()).await {
            Ok(()) => info!(topic = %self.topic, "Producer flushed"),
            Err(e) => warn!(topic = %self.topic, error = %e, "Producer flush failed"),
        }
    }
}
