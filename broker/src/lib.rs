//! RateStream Broker
//!
//! The publish/subscribe seam between the producer and the consumer.
//!
//! # Features
//!
//! - `MessagePublisher`, `MessageSubscriber` and `TopicAdmin` traits
//! - Fixed producer and consumer settings contracts
//! - `MemoryBroker`, an in-process topic log for tests and local runs
//! - Kafka implementation behind the `kafka` cargo feature

pub mod error;
pub mod memory;
pub mod settings;
pub mod traits;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use error::{BrokerError, BrokerResult};
pub use memory::{MemoryBroker, MemorySubscriber};
pub use settings::{
    BrokerEndpoint, ConsumerSettings, OffsetReset, ProducerSettings, RunMode, TopicSpec,
    DEFAULT_TOPIC,
};
pub use traits::{
    BrokerRecord, DeliveryReceipt, MessagePublisher, MessageSubscriber, TopicAdmin, TopicStatus,
};

#[cfg(feature = "kafka")]
pub use kafka::{KafkaAdmin, KafkaPublisher, KafkaSubscriber};
