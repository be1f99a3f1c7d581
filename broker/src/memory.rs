//! In-process broker.
//!
//! Each topic is a single append-only log. Consumer groups keep their own
//! committed position, so two subscribers in the same group resume where the
//! group left off and subscribers in different groups each see every record.
//!
//! The broker lives and dies with the process and is meant for development
//! and tests. A bounded broker drops the oldest records past its limit;
//! subscribers positioned before the retained range skip ahead to it.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{BrokerError, BrokerResult};
use crate::settings::{ConsumerSettings, OffsetReset, TopicSpec};
use crate::traits::{
    BrokerRecord, DeliveryReceipt, MessagePublisher, MessageSubscriber, TopicAdmin, TopicStatus,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Option<String>,
    payload: Option<Vec<u8>>,
}

/// Retained records; `base` is the offset of the oldest one.
#[derive(Default)]
struct Records {
    base: i64,
    entries: VecDeque<StoredRecord>,
}

impl Records {
    fn end(&self) -> i64 {
        self.base + self.entries.len() as i64
    }
}

#[derive(Default)]
struct TopicLog {
    records: RwLock<Records>,
    appended: Notify,
}

struct BrokerState {
    topics: DashMap<String, Arc<TopicLog>>,
    /// Next offset to read, per (group, topic).
    committed: DashMap<(String, String), i64>,
    auto_create_topics: bool,
    /// Records kept per topic; `None` keeps everything.
    retention: Option<usize>,
}

/// In-process broker shared by publishers, subscribers and admin handles.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Default per-topic limit for [`MemoryBroker::bounded`] brokers in binaries.
    pub const DEFAULT_RETAINED_RECORDS: usize = 1_000;

    /// Broker that creates topics on first publish and keeps every record.
    pub fn new() -> Self {
        Self::build(true, None)
    }

    /// Broker that rejects publishes to topics nobody created.
    pub fn strict() -> Self {
        Self::build(false, None)
    }

    /// Broker that keeps at most `max_records` per topic.
    pub fn bounded(max_records: usize) -> Self {
        Self::build(true, Some(max_records.max(1)))
    }

    fn build(auto_create_topics: bool, retention: Option<usize>) -> Self {
        Self {
            state: Arc::new(BrokerState {
                topics: DashMap::new(),
                committed: DashMap::new(),
                auto_create_topics,
                retention,
            }),
        }
    }

    /// Create a subscriber in the settings' consumer group.
    pub fn subscriber(&self, settings: &ConsumerSettings) -> MemorySubscriber {
        MemorySubscriber {
            state: self.state.clone(),
            group_id: settings.group_id.clone(),
            offset_reset: settings.auto_offset_reset,
            auto_commit: settings.enable_auto_commit,
            topic: None,
            position: 0,
            closed: false,
        }
    }

    /// Check whether a topic exists.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.state.topics.contains_key(topic)
    }

    /// Number of retained records in a topic.
    pub fn topic_len(&self, topic: &str) -> usize {
        self.state
            .topics
            .get(topic)
            .map(|log| log.records.read().entries.len())
            .unwrap_or(0)
    }

    /// Payloads in a topic, oldest first. Tombstones are skipped.
    pub fn payloads(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state
            .topics
            .get(topic)
            .map(|log| {
                log.records
                    .read()
                    .entries
                    .iter()
                    .filter_map(|r| r.payload.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append a record with no value.
    pub fn publish_tombstone(&self, topic: &str, key: &str) -> BrokerResult<DeliveryReceipt> {
        self.append(topic, Some(key.to_string()), None)
    }

    fn create(&self, topic: &str) -> TopicStatus {
        let mut status = TopicStatus::AlreadyExists;
        self.state.topics.entry(topic.to_string()).or_insert_with(|| {
            status = TopicStatus::Created;
            Arc::new(TopicLog::default())
        });
        status
    }

    fn append(
        &self,
        topic: &str,
        key: Option<String>,
        payload: Option<Vec<u8>>,
    ) -> BrokerResult<DeliveryReceipt> {
        let existing = self.state.topics.get(topic).map(|log| log.clone());
        let log = match existing {
            Some(log) => log,
            None if self.state.auto_create_topics => self
                .state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(TopicLog::default()))
                .clone(),
            None => return Err(BrokerError::UnknownTopicOrPartition(topic.to_string())),
        };

        let offset = {
            let mut records = log.records.write();
            records.entries.push_back(StoredRecord { key, payload });
            if let Some(max) = self.state.retention {
                while records.entries.len() > max {
                    records.entries.pop_front();
                    records.base += 1;
                }
            }
            records.end() - 1
        };
        log.appended.notify_waiters();

        debug!(topic, offset, "Record appended");
        Ok(DeliveryReceipt {
            partition: 0,
            offset,
        })
    }
}

#[async_trait]
impl MessagePublisher for MemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> BrokerResult<DeliveryReceipt> {
        self.append(topic, Some(key.to_string()), Some(payload.to_vec()))
    }

    async fn flush(&self, _timeout: Duration) -> BrokerResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TopicAdmin for MemoryBroker {
    async fn ensure_topic(&self, spec: &TopicSpec) -> BrokerResult<TopicStatus> {
        Ok(self.create(&spec.name))
    }
}

/// Subscriber handle on a [`MemoryBroker`].
pub struct MemorySubscriber {
    state: Arc<BrokerState>,
    group_id: String,
    offset_reset: OffsetReset,
    auto_commit: bool,
    topic: Option<String>,
    position: i64,
    closed: bool,
}

impl MemorySubscriber {
    fn take_next(&mut self, topic: &str, log: &TopicLog) -> Option<BrokerRecord> {
        let record = {
            let records = log.records.read();
            self.position = self.position.max(records.base);
            records
                .entries
                .get((self.position - records.base) as usize)
                .cloned()
        }?;

        let offset = self.position;
        self.position += 1;
        if self.auto_commit {
            self.state
                .committed
                .insert((self.group_id.clone(), topic.to_string()), self.position);
        }

        Some(BrokerRecord {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key: record.key,
            payload: record.payload,
        })
    }
}

#[async_trait]
impl MessageSubscriber for MemorySubscriber {
    async fn subscribe(&mut self, topic: &str) -> BrokerResult<()> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let committed = self
            .state
            .committed
            .get(&(self.group_id.clone(), topic.to_string()))
            .map(|offset| *offset);
        self.position = match (committed, self.offset_reset) {
            (Some(offset), _) => offset,
            (None, OffsetReset::Earliest) => 0,
            (None, OffsetReset::Latest) => self
                .state
                .topics
                .get(topic)
                .map(|log| log.records.read().end())
                .unwrap_or(0),
        };
        self.topic = Some(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerRecord>> {
        if self.closed {
            return Err(BrokerError::Closed);
        }
        let topic = self
            .topic
            .clone()
            .ok_or_else(|| BrokerError::Configuration("poll before subscribe".to_string()))?;
        let log = self
            .state
            .topics
            .get(&topic)
            .map(|log| log.clone())
            .ok_or_else(|| BrokerError::UnknownTopicOrPartition(topic.clone()))?;

        let appended = log.appended.notified();
        if let Some(record) = self.take_next(&topic, &log) {
            return Ok(Some(record));
        }

        match tokio::time::timeout(timeout, appended).await {
            Ok(()) => Ok(self.take_next(&topic, &log)),
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.closed = true;
        self.topic = None;
        Ok(())
    }
}
