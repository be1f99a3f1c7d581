//! Broker client traits and record types.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::BrokerResult;
use crate::settings::TopicSpec;

/// Where an acknowledged record landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub partition: i32,
    pub offset: i64,
}

/// A record read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    /// `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

/// Outcome of an idempotent topic create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
    Created,
    AlreadyExists,
}

/// Publishes records to a topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one record and wait for the broker's acknowledgement.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8])
        -> BrokerResult<DeliveryReceipt>;

    /// Deliver anything still buffered, giving up after `timeout`.
    async fn flush(&self, timeout: Duration) -> BrokerResult<()>;
}

/// Reads records from a subscribed topic.
#[async_trait]
pub trait MessageSubscriber: Send {
    /// Subscribe to a topic, replacing any previous subscription.
    async fn subscribe(&mut self, topic: &str) -> BrokerResult<()>;

    /// Wait up to `timeout` for the next record. `Ok(None)` on timeout.
    async fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerRecord>>;

    /// Leave the group and release the subscription.
    async fn close(&mut self) -> BrokerResult<()>;
}

/// Topic administration.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Create the topic unless it already exists.
    async fn ensure_topic(&self, spec: &TopicSpec) -> BrokerResult<TopicStatus>;
}
