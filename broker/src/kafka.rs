//! Kafka clients built on rdkafka.

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{BrokerError, BrokerResult};
use crate::settings::{ConsumerSettings, ProducerSettings, TopicSpec};
use crate::traits::{
    BrokerRecord, DeliveryReceipt, MessagePublisher, MessageSubscriber, TopicAdmin, TopicStatus,
};

impl From<KafkaError> for BrokerError {
    fn from(e: KafkaError) -> Self {
        match e {
            KafkaError::MessageConsumption(RDKafkaErrorCode::UnknownTopicOrPartition)
            | KafkaError::MessageConsumption(RDKafkaErrorCode::UnknownTopic)
            | KafkaError::MessageProduction(RDKafkaErrorCode::UnknownTopicOrPartition) => {
                BrokerError::UnknownTopicOrPartition(e.to_string())
            }
            KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => {
                BrokerError::Backpressure(e.to_string())
            }
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
                BrokerError::Timeout(e.to_string())
            }
            KafkaError::ClientConfig(..) | KafkaError::ClientCreation(_) => {
                BrokerError::Configuration(e.to_string())
            }
            other => BrokerError::Transport(other.to_string()),
        }
    }
}

fn client_config(properties: Vec<(&'static str, String)>) -> ClientConfig {
    let mut config = ClientConfig::new();
    for (key, value) in properties {
        config.set(key, value);
    }
    config
}

/// Idempotent Kafka producer.
pub struct KafkaPublisher {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaPublisher {
    /// Create a producer from settings.
    pub fn new(settings: &ProducerSettings) -> BrokerResult<Self> {
        settings.validate().map_err(BrokerError::Configuration)?;
        let producer: FutureProducer = client_config(settings.client_properties()).create()?;

        info!(servers = %settings.bootstrap_servers, "Kafka producer created");
        Ok(Self {
            producer,
            send_timeout: settings.send_timeout,
        })
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> BrokerResult<DeliveryReceipt> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
            .map_err(|(e, _)| BrokerError::from(e))?;

        debug!(topic, partition, offset, "Kafka delivery acknowledged");
        Ok(DeliveryReceipt { partition, offset })
    }

    async fn flush(&self, timeout: Duration) -> BrokerResult<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))??;
        Ok(())
    }
}

/// Kafka consumer group member.
pub struct KafkaSubscriber {
    consumer: StreamConsumer,
}

impl KafkaSubscriber {
    /// Create a consumer from settings.
    pub fn new(settings: &ConsumerSettings) -> BrokerResult<Self> {
        let consumer: StreamConsumer = client_config(settings.client_properties()).create()?;

        info!(
            servers = %settings.bootstrap_servers,
            group_id = %settings.group_id,
            "Kafka consumer created"
        );
        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageSubscriber for KafkaSubscriber {
    async fn subscribe(&mut self, topic: &str) -> BrokerResult<()> {
        self.consumer.subscribe(&[topic])?;
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerRecord>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(message)) => Ok(Some(BrokerRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
        }
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.consumer.unsubscribe();
        Ok(())
    }
}

/// Kafka topic administration.
pub struct KafkaAdmin {
    admin: AdminClient<DefaultClientContext>,
}

impl KafkaAdmin {
    /// Create an admin client for the given servers.
    pub fn new(bootstrap_servers: &str) -> BrokerResult<Self> {
        let admin = client_config(vec![("bootstrap.servers", bootstrap_servers.to_string())])
            .create()?;
        Ok(Self { admin })
    }
}

#[async_trait]
impl TopicAdmin for KafkaAdmin {
    async fn ensure_topic(&self, spec: &TopicSpec) -> BrokerResult<TopicStatus> {
        let topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication),
        );
        let results = self
            .admin
            .create_topics(&[topic], &AdminOptions::new())
            .await?;

        let mut status = TopicStatus::Created;
        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    status = TopicStatus::AlreadyExists;
                }
                Err((topic, code)) => {
                    return Err(BrokerError::Admin {
                        topic,
                        reason: code.to_string(),
                    });
                }
            }
        }
        Ok(status)
    }
}
