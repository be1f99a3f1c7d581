//! Producer configuration.

use ratestream_broker::{RunMode, DEFAULT_TOPIC};
use ratestream_common::{constants, parse_pair_list, CommonError, CurrencyPair};
use ratestream_providers::ProviderSettings;

use crate::orchestrator::DEFAULT_MAX_PARALLELISM;

/// Main producer configuration.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Broker pipeline or direct fetches only.
    pub run_mode: RunMode,
    /// Broker bootstrap servers; `memory://` selects the in-process broker.
    pub bootstrap_servers: String,
    /// Topic packages are published to.
    pub topic: String,
    /// Provider selection and client settings.
    pub providers: ProviderSettings,
    /// Pair fetches in flight per cycle.
    pub max_parallelism: usize,
    /// Pairs streamed from boot, e.g. `USD:EUR,GBP:JPY`.
    pub stream_pairs: Option<String>,
    /// Interval for the boot stream.
    pub stream_interval_secs: u64,
    /// Log filter: `RUST_LOG` when set, else `LOG_LEVEL`.
    pub log_level: String,
    /// Environment values that could not be parsed.
    pub env_errors: Vec<String>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Broker,
            bootstrap_servers: String::new(),
            topic: DEFAULT_TOPIC.to_string(),
            providers: ProviderSettings::default(),
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            stream_pairs: None,
            stream_interval_secs: constants::default_stream_interval().as_secs(),
            log_level: "info".to_string(),
            env_errors: Vec::new(),
        }
    }
}

impl ProducerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from `lookup`, which maps a variable name to its value.
    ///
    /// Values that fail to parse keep the default and are reported by
    /// [`ProducerConfig::validate`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            providers: ProviderSettings::from_lookup(&lookup),
            ..Self::default()
        };

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

        if let Some(n) = lookup("FETCH_MAX_PARALLELISM") {
            match n.trim().parse() {
                Ok(n) => config.max_parallelism = n,
                Err(e) => config
                    .env_errors
                    .push(format!("FETCH_MAX_PARALLELISM={n}: {e}")),
            }
        }

        if let Some(pairs) = lookup("STREAM_PAIRS") {
            config.stream_pairs = Some(pairs);
        }

        if let Some(secs) = lookup("STREAM_INTERVAL_SECS") {
            match secs.trim().parse() {
                Ok(secs) => config.stream_interval_secs = secs,
                Err(e) => config
                    .env_errors
                    .push(format!("STREAM_INTERVAL_SECS={secs}: {e}")),
            }
        }

        if let Some(level) = lookup("RUST_LOG").or_else(|| lookup("LOG_LEVEL")) {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(e) = self.env_errors.first() {
            return Err(format!("Invalid environment value {e}"));
        }

        if self.run_mode.uses_broker() {
            if self.bootstrap_servers.trim().is_empty() {
                return Err("Bootstrap servers cannot be empty in broker mode".to_string());
            }
            if self.topic.trim().is_empty() {
                return Err("Topic cannot be empty in broker mode".to_string());
            }
        }

        if self.max_parallelism == 0 {
            return Err("Fetch parallelism cannot be 0".to_string());
        }

        self.providers.validate()?;
        self.boot_pairs().map_err(|e| format!("Invalid STREAM_PAIRS: {e}"))?;

        Ok(())
    }

    /// Pairs for the boot stream; empty when none are configured.
    pub fn boot_pairs(&self) -> Result<Vec<CurrencyPair>, CommonError> {
        match &self.stream_pairs {
            Some(raw) => parse_pair_list(raw),
            None => Ok(Vec::new()),
        }
    }
}
