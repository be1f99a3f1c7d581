//! Broker client settings.
//!
//! These are fixed per process, not per call. Each settings type renders to
//! librdkafka-style properties so any client implementation reads the same
//! contract.

use std::fmt;
use std::time::Duration;

use ratestream_common::constants;

/// Topic packages are published to when none is configured.
pub const DEFAULT_TOPIC: &str = "exchange-packages";

/// Where the broker lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEndpoint {
    /// In-process broker, selected with `memory://`.
    Memory,
    /// Comma separated bootstrap servers.
    Kafka(String),
}

impl BrokerEndpoint {
    pub const MEMORY_SCHEME: &'static str = "memory://";

    /// Classify a bootstrap servers string. Returns `None` when empty.
    pub fn parse(bootstrap_servers: &str) -> Option<Self> {
        let servers = bootstrap_servers.trim();
        if servers.is_empty() {
            None
        } else if servers.starts_with(Self::MEMORY_SCHEME) {
            Some(BrokerEndpoint::Memory)
        } else {
            Some(BrokerEndpoint::Kafka(servers.to_string()))
        }
    }
}

/// Whether the process runs the broker pipeline at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Streams publish to the broker and the consumer runs.
    Broker,
    /// Direct fetches only. Streams are refused and the consumer exits.
    Direct,
}

impl RunMode {
    /// Check if broker-backed components should run.
    pub fn uses_broker(&self) -> bool {
        matches!(self, RunMode::Broker)
    }
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Broker
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Broker => f.write_str("broker"),
            RunMode::Direct => f.write_str("direct"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kafka" | "broker" => Ok(RunMode::Broker),
            "direct" => Ok(RunMode::Direct),
            other => Err(format!("Unknown run mode: {other}")),
        }
    }
}

/// Producer delivery contract.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    /// Bootstrap servers.
    pub bootstrap_servers: String,
    /// Acknowledgement level; `all` waits for every in-sync replica.
    pub acks: String,
    /// Idempotent producer mode.
    pub enable_idempotence: bool,
    /// Micro-batching linger window.
    pub linger: Duration,
    /// Compression codec.
    pub compression: String,
    /// Per-message delivery timeout.
    pub send_timeout: Duration,
    /// Backoff between internal retries.
    pub retry_backoff: Duration,
}

impl ProducerSettings {
    /// Settings with the fixed delivery contract for the given servers.
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            acks: "all".to_string(),
            enable_idempotence: true,
            linger: constants::producer_linger(),
            compression: "lz4".to_string(),
            send_timeout: constants::send_timeout(),
            retry_backoff: constants::producer_retry_backoff(),
        }
    }

    /// Render as client properties.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("acks", self.acks.clone()),
            ("enable.idempotence", self.enable_idempotence.to_string()),
            ("linger.ms", self.linger.as_millis().to_string()),
            ("compression.type", self.compression.clone()),
            ("message.timeout.ms", self.send_timeout.as_millis().to_string()),
            ("retry.backoff.ms", self.retry_backoff.as_millis().to_string()),
        ]
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err("Bootstrap servers cannot be empty".to_string());
        }
        if self.send_timeout.is_zero() {
            return Err("Send timeout cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Where a new consumer group starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetReset::Earliest => f.write_str("earliest"),
            OffsetReset::Latest => f.write_str("latest"),
        }
    }
}

/// Consumer group settings.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Bootstrap servers.
    pub bootstrap_servers: String,
    /// Consumer group id.
    pub group_id: String,
    /// Offset reset policy for a new group.
    pub auto_offset_reset: OffsetReset,
    /// Commit offsets automatically.
    pub enable_auto_commit: bool,
}

impl ConsumerSettings {
    pub const DEFAULT_GROUP_ID: &'static str = "ce-consumer-1";

    /// Settings with the default group for the given servers.
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: Self::DEFAULT_GROUP_ID.to_string(),
            auto_offset_reset: OffsetReset::Earliest,
            enable_auto_commit: true,
        }
    }

    /// Render as client properties.
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bootstrap.servers", self.bootstrap_servers.clone()),
            ("group.id", self.group_id.clone()),
            ("auto.offset.reset", self.auto_offset_reset.to_string()),
            ("enable.auto.commit", self.enable_auto_commit.to_string()),
        ]
    }
}

/// Topic creation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    /// Topic name.
    pub name: String,
    /// Partition count.
    pub partitions: i32,
    /// Replication factor.
    pub replication: i32,
}

impl TopicSpec {
    /// Three partitions, replication factor one.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 3,
            replication: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(BrokerEndpoint::parse(""), None);
        assert_eq!(BrokerEndpoint::parse("memory://"), Some(BrokerEndpoint::Memory));
        assert_eq!(
            BrokerEndpoint::parse(" localhost:9092 "),
            Some(BrokerEndpoint::Kafka("localhost:9092".into()))
        );
    }

    #[test]
    fn test_producer_contract() {
        let props = ProducerSettings::new("localhost:9092").client_properties();
        let get = |k: &str| props.iter().find(|(key, _)| *key == k).map(|(_, v)| v.as_str());

        assert_eq!(get("acks"), Some("all"));
        assert_eq!(get("enable.idempotence"), Some("true"));
        assert_eq!(get("linger.ms"), Some("5"));
        assert_eq!(get("compression.type"), Some("lz4"));
        assert_eq!(get("message.timeout.ms"), Some("30000"));
        assert_eq!(get("retry.backoff.ms"), Some("200"));
    }

    #[test]
    fn test_consumer_defaults() {
        let props = ConsumerSettings::new("localhost:9092").client_properties();
        assert!(props.contains(&("group.id", "ce-consumer-1".to_string())));
        assert!(props.contains(&("auto.offset.reset", "earliest".to_string())));
        assert!(props.contains(&("enable.auto.commit", "true".to_string())));
    }

    #[test]
    fn test_producer_validate() {
        assert!(ProducerSettings::new("localhost:9092").validate().is_ok());
        assert!(ProducerSettings::new(" ").validate().is_err());
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("Kafka".parse::<RunMode>(), Ok(RunMode::Broker));
        assert_eq!("broker".parse::<RunMode>(), Ok(RunMode::Broker));
        assert_eq!(" DIRECT ".parse::<RunMode>(), Ok(RunMode::Direct));
        assert!("sideways".parse::<RunMode>().is_err());
        assert!(RunMode::default().uses_broker());
    }

    #[test]
    fn test_topic_spec_defaults() {
        let spec = TopicSpec::new("exchange-packages");
        assert_eq!(spec.partitions, 3);
        assert_eq!(spec.replication, 1);
    }
}
