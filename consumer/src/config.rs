//! Consumer configuration.

use ratestream_broker::{ConsumerSettings, RunMode, DEFAULT_TOPIC};

/// Configuration for the package consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// The consumer exits at once unless this is broker mode.
    pub run_mode: RunMode,
    /// Broker bootstrap servers; `memory://` selects the in-process broker.
    pub bootstrap_servers: String,
    /// Topic to read packages from.
    pub topic: String,
    /// Consumer group id.
    pub group_id: String,
    /// Create the topic before subscribing.
    pub ensure_topic: bool,
    /// Log filter: `RUST_LOG` when set, else `LOG_LEVEL`.
    pub log_level: String,
    /// Environment values that could not be parsed.
    pub env_errors: Vec<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Broker,
            bootstrap_servers: String::new(),
            topic: DEFAULT_TOPIC.to_string(),
            group_id: ConsumerSettings::DEFAULT_GROUP_ID.to_string(),
            ensure_topic: true,
            log_level: "info".to_string(),
            env_errors: Vec::new(),
        }
    }
}

impl ConsumerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from `lookup`, which maps a variable name to its value.
    ///
    /// Values that fail to parse keep the default and are reported by
    /// [`ConsumerConfig::validate`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(mode) = lookup("RUN_MODE") {
            match mode.parse() {
                Ok(mode) => config.run_mode = mode,
                Err(e) => config.env_errors.push(format!("RUN_MODE: {e}")),
            }
        }

        if let Some(servers) = lookup("KAFKA_BOOTSTRAP_SERVERS") {
            config.bootstrap_servers = servers;
        }

        if let Some(topic) = lookup("KAFKA_TOPIC") {
            config.topic = topic;
        }

        if let Some(group) = lookup("KAFKA_GROUP_ID") {
            config.group_id = group;
        }

        if let Some(ensure) = lookup("KAFKA_ENSURE_TOPIC") {
            match ensure.trim().to_ascii_lowercase().parse() {
                Ok(ensure) => config.ensure_topic = ensure,
                Err(e) => config
                    .env_errors
                    .push(format!("KAFKA_ENSURE_TOPIC={ensure}: {e}")),
            }
        }

        if let Some(level) = lookup("RUST_LOG").or_else(|| lookup("LOG_LEVEL")) {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    ///
    /// Missing servers or topic are not rejected here; the consumer logs
    /// them and exits without subscribing.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(e) = self.env_errors.first() {
            return Err(format!("Invalid environment value {e}"));
        }
        if self.run_mode.uses_broker() && self.group_id.trim().is_empty() {
            return Err("Consumer group id cannot be empty".to_string());
        }
        Ok(())
    }

    /// Client settings for the configured group.
    pub fn settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            group_id: self.group_id.clone(),
            ..ConsumerSettings::new(self.bootstrap_servers.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratestream_broker::OffsetReset;

    #[test]
    fn test_default_config() {
        let config = ConsumerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.topic, "exchange-packages");
        assert_eq!(config.group_id, "ce-consumer-1");
    }

    #[test]
    fn test_settings_carry_group() {
        let config = ConsumerConfig {
            bootstrap_servers: "localhost:9092".to_string(),
            group_id: "rates-reader".to_string(),
            ..ConsumerConfig::default()
        };
        let settings = config.settings();
        assert_eq!(settings.group_id, "rates-reader");
        assert_eq!(settings.auto_offset_reset, OffsetReset::Earliest);
        assert!(settings.enable_auto_commit);
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut config = ConsumerConfig::default();
        config.group_id = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = ConsumerConfig::from_lookup(|key| match key {
            "RUN_MODE" => Some("kafka".to_string()),
            "KAFKA_BOOTSTRAP_SERVERS" => Some("localhost:9092".to_string()),
            "KAFKA_ENSURE_TOPIC" => Some("False".to_string()),
            _ => None,
        });
        assert!(config.validate().is_ok());
        assert_eq!(config.run_mode, RunMode::Broker);
        assert!(!config.ensure_topic);
    }

    #[test]
    fn test_unknown_run_mode_is_fatal() {
        let config = ConsumerConfig::from_lookup(|key| match key {
            "RUN_MODE" => Some("drect".to_string()),
            _ => None,
        });
        let err = config.validate().unwrap_err();
        assert!(err.contains("RUN_MODE"));
        assert!(err.contains("drect"));
    }

    #[test]
    fn test_malformed_ensure_topic_is_fatal() {
        let config = ConsumerConfig::from_lookup(|key| match key {
            "KAFKA_ENSURE_TOPIC" => Some("maybe".to_string()),
            _ => None,
        });
        assert!(config.validate().unwrap_err().contains("KAFKA_ENSURE_TOPIC"));
    }

    #[test]
    fn test_log_filter_prefers_rust_log() {
        let level = |vars: &'static [(&'static str, &'static str)]| {
            ConsumerConfig::from_lookup(|key| {
                vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
            })
            .log_level
        };

        assert_eq!(level(&[]), "info");
        assert_eq!(level(&[("LOG_LEVEL", "warn")]), "warn");
        assert_eq!(
            level(&[("LOG_LEVEL", "warn"), ("RUST_LOG", "ratestream=trace")]),
            "ratestream=trace"
        );
    }
}
