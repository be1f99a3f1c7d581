//! The package consumer loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ratestream_broker::{BrokerRecord, MessageSubscriber, TopicAdmin, TopicSpec, TopicStatus};
use ratestream_common::constants;
use ratestream_protocol::decode_package;

use crate::cache::SharedCache;
use crate::config::ConsumerConfig;
use crate::state::ConsumerState;
use crate::stats::{ConsumerStats, SharedStats};

/// Reads packages from the topic into the last-package cache.
///
/// Every error is handled inside the loop. The loop only ends when its
/// token is cancelled, after which the subscription is closed.
pub struct PackageConsumer {
    config: ConsumerConfig,
    subscriber: Box<dyn MessageSubscriber>,
    admin: Option<Arc<dyn TopicAdmin>>,
    cache: SharedCache,
    stats: SharedStats,
    state: ConsumerState,
}

impl PackageConsumer {
    /// Create a consumer over a subscriber.
    pub fn new(
        config: ConsumerConfig,
        subscriber: Box<dyn MessageSubscriber>,
        cache: SharedCache,
    ) -> Self {
        Self {
            config,
            subscriber,
            admin: None,
            cache,
            stats: Arc::new(ConsumerStats::new()),
            state: ConsumerState::Starting,
        }
    }

    /// Ensure the topic exists through this admin client before subscribing.
    pub fn with_admin(mut self, admin: Arc<dyn TopicAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Counters shared with observers.
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Run until cancelled.
    pub async fn run(&mut self, token: CancellationToken) {
        if !self.config.run_mode.uses_broker() {
            info!(run_mode = %self.config.run_mode, "Consumer disabled for run mode");
            return;
        }
        if self.config.bootstrap_servers.trim().is_empty() {
            error!("Bootstrap servers not configured, consumer not started");
            return;
        }
        if self.config.topic.trim().is_empty() {
            error!("Topic not configured, consumer not started");
            return;
        }

        let topic = self.config.topic.clone();

        if self.config.ensure_topic {
            if let Some(admin) = self.admin.clone() {
                ensure_topic(admin.as_ref(), &topic).await;
            }
        }

        while let Err(e) = self.subscriber.subscribe(&topic).await {
            self.stats.record_error();
            error!(topic = %topic, error_code = e.error_code(), error = %e, "Subscribe failed");
            if !pause(&token, constants::consume_error_delay()).await {
                self.close().await;
                return;
            }
        }
        self.state = ConsumerState::Subscribed;
        info!(topic = %topic, group_id = %self.config.group_id, "Consumer subscribed");

        loop {
            let polled = tokio::select! {
                _ = token.cancelled() => break,
                polled = self.subscriber.poll(constants::consumer_poll_timeout()) => polled,
            };

            match polled {
                Ok(None) => {}
                Ok(Some(record)) => {
                    self.state = ConsumerState::Consuming;
                    self.handle_record(record);
                }
                Err(e) if e.is_unknown_topic() => {
                    self.stats.record_error();
                    warn!(
                        topic = %topic,
                        error = %e,
                        retry_secs = constants::unknown_topic_retry_delay().as_secs(),
                        "Topic not available yet, resubscribing"
                    );
                    if !pause(&token, constants::unknown_topic_retry_delay()).await {
                        break;
                    }
                    match self.subscriber.subscribe(&topic).await {
                        Ok(()) => self.stats.record_resubscribe(),
                        Err(e) => error!(topic = %topic, error = %e, "Resubscribe failed"),
                    }
                }
                Err(e) => {
                    self.stats.record_error();
                    let retryable = e.is_retryable();
                    error!(
                        topic = %topic,
                        error_code = e.error_code(),
                        error = %e,
                        retryable,
                        "Unexpected consume error"
                    );
                    if !pause(&token, constants::consume_error_delay()).await {
                        break;
                    }
                    // Polling again cannot clear a non-retryable error.
                    if !retryable {
                        match self.subscriber.subscribe(&topic).await {
                            Ok(()) => self.stats.record_resubscribe(),
                            Err(e) => error!(topic = %topic, error = %e, "Resubscribe failed"),
                        }
                    }
                }
            }
        }

        self.close().await;
    }

    fn handle_record(&self, record: BrokerRecord) {
        let Some(payload) = record.payload else {
            self.stats.record_skipped();
            warn!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                key = ?record.key,
                "Tombstone record skipped"
            );
            return;
        };

        match decode_package(&payload) {
            Ok(package) => {
                debug!(
                    partition = record.partition,
                    offset = record.offset,
                    rates = package.len(),
                    time = %package.time(),
                    "Package cached"
                );
                self.cache.set(package);
                self.stats.record_consumed();
            }
            Err(e) => {
                self.stats.record_malformed();
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error_code = e.error_code(),
                    error = %e,
                    payload = %String::from_utf8_lossy(&payload),
                    "Malformed package skipped"
                );
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.subscriber.close().await {
            warn!(error = %e, "Error closing subscription");
        }
        self.state = ConsumerState::Closed;
        info!(topic = %self.config.topic, "Consumer closed");
    }
}

async fn ensure_topic(admin: &dyn TopicAdmin, topic: &str) {
    match admin.ensure_topic(&TopicSpec::new(topic)).await {
        Ok(TopicStatus::Created) => info!(topic = %topic, "Topic created"),
        Ok(TopicStatus::AlreadyExists) => info!(topic = %topic, "Topic already exists"),
        Err(e) => warn!(
            topic = %topic,
            error = %e,
            "Topic ensure failed, subscribing anyway"
        ),
    }
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn pause(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LastPackageCache;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use ratestream_broker::{
        BrokerError, BrokerResult, ConsumerSettings, MemoryBroker, MessagePublisher, RunMode,
    };
    use ratestream_common::{CurrencyPair, ExchangePackage, ExchangeRate};
    use ratestream_protocol::encode_package;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use tokio::task::JoinHandle;
    use tokio_test::assert_ok;

    const TOPIC: &str = "exchange-packages";

    fn config() -> ConsumerConfig {
        ConsumerConfig {
            bootstrap_servers: "memory://".to_string(),
            ..ConsumerConfig::default()
        }
    }

    fn package(rate: rust_decimal::Decimal) -> ExchangePackage {
        ExchangePackage::assemble(vec![ExchangeRate::new(
            CurrencyPair::from_codes("USD", "EUR").unwrap(),
            rate,
        )
        .unwrap()])
    }

    fn spawn(mut consumer: PackageConsumer, token: CancellationToken) -> JoinHandle<PackageConsumer> {
        tokio::spawn(async move {
            consumer.run(token).await;
            consumer
        })
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[derive(Default)]
    struct Script {
        polls: VecDeque<BrokerResult<Option<BrokerRecord>>>,
        subscribes: usize,
        closed: bool,
    }

    /// Replays scripted poll results, then idles.
    struct ScriptedSubscriber(Arc<Mutex<Script>>);

    #[async_trait]
    impl MessageSubscriber for ScriptedSubscriber {
        async fn subscribe(&mut self, _topic: &str) -> BrokerResult<()> {
            self.0.lock().subscribes += 1;
            Ok(())
        }

        async fn poll(&mut self, timeout: Duration) -> BrokerResult<Option<BrokerRecord>> {
            let next = self.0.lock().polls.pop_front();
            match next {
                Some(result) => result,
                None => {
                    tokio::time::sleep(timeout).await;
                    Ok(None)
                }
            }
        }

        async fn close(&mut self) -> BrokerResult<()> {
            self.0.lock().closed = true;
            Ok(())
        }
    }

    fn record(payload: Option<Vec<u8>>) -> BrokerRecord {
        BrokerRecord {
            topic: TOPIC.to_string(),
            partition: 0,
            offset: 0,
            key: Some("k".to_string()),
            payload,
        }
    }

    #[tokio::test]
    async fn test_direct_mode_never_subscribes() {
        let script = Arc::new(Mutex::new(Script::default()));
        let mut consumer = PackageConsumer::new(
            ConsumerConfig {
                run_mode: RunMode::Direct,
                ..config()
            },
            Box::new(ScriptedSubscriber(script.clone())),
            Arc::new(LastPackageCache::new()),
        );

        consumer.run(CancellationToken::new()).await;
        assert_eq!(script.lock().subscribes, 0);
        assert_eq!(consumer.state(), ConsumerState::Starting);
    }

    #[tokio::test]
    async fn test_missing_servers_never_subscribes() {
        let script = Arc::new(Mutex::new(Script::default()));
        let mut consumer = PackageConsumer::new(
            ConsumerConfig::default(),
            Box::new(ScriptedSubscriber(script.clone())),
            Arc::new(LastPackageCache::new()),
        );

        consumer.run(CancellationToken::new()).await;
        assert_eq!(script.lock().subscribes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumes_skips_and_tolerates_bad_records() {
        let broker = MemoryBroker::new();
        assert_ok!(broker.publish(TOPIC, "a", &encode_package(&package(dec!(0.91))).unwrap()).await);
        assert_ok!(broker.publish_tombstone(TOPIC, "b"));
        assert_ok!(broker.publish(TOPIC, "c", b"{not json").await);
        assert_ok!(broker.publish(TOPIC, "d", &encode_package(&package(dec!(0.93))).unwrap()).await);

        let cache = Arc::new(LastPackageCache::new());
        let consumer = PackageConsumer::new(
            config(),
            Box::new(broker.subscriber(&ConsumerSettings::new("memory://"))),
            cache.clone(),
        )
        .with_admin(Arc::new(broker.clone()));
        let stats = consumer.stats();

        let token = CancellationToken::new();
        let handle = spawn(consumer, token.clone());
        advance(3).await;

        assert_eq!(cache.get().unwrap().rates()[0].rate(), dec!(0.93));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.consumed, 2);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.malformed, 1);

        // Later packages keep replacing the slot.
        assert_ok!(broker.publish(TOPIC, "e", &encode_package(&package(dec!(0.95))).unwrap()).await);
        advance(2).await;
        assert_eq!(cache.get().unwrap().rates()[0].rate(), dec!(0.95));

        token.cancel();
        let consumer = handle.await.unwrap();
        assert_eq!(consumer.state(), ConsumerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_topic_resubscribes() {
        let broker = MemoryBroker::strict();
        let cache = Arc::new(LastPackageCache::new());
        let consumer = PackageConsumer::new(
            config(),
            Box::new(broker.subscriber(&ConsumerSettings::new("memory://"))),
            cache.clone(),
        );
        let stats = consumer.stats();

        let token = CancellationToken::new();
        let handle = spawn(consumer, token.clone());
        advance(1).await;
        assert_eq!(stats.snapshot().errors, 1);
        assert_eq!(stats.snapshot().resubscribes, 0);

        assert_ok!(broker.ensure_topic(&TopicSpec::new(TOPIC)).await);
        assert_ok!(broker.publish(TOPIC, "a", &encode_package(&package(dec!(0.92))).unwrap()).await);
        advance(6).await;

        assert_eq!(stats.snapshot().resubscribes, 1);
        assert!(cache.get().is_some());

        token.cancel();
        assert_ok!(handle.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_pause_then_continue() {
        let script = Arc::new(Mutex::new(Script::default()));
        {
            let mut script = script.lock();
            script
                .polls
                .push_back(Err(BrokerError::Transport("connection reset".into())));
            script.polls.push_back(Ok(Some(record(Some(
                encode_package(&package(dec!(0.92))).unwrap(),
            )))));
        }

        let cache = Arc::new(LastPackageCache::new());
        let consumer = PackageConsumer::new(
            config(),
            Box::new(ScriptedSubscriber(script.clone())),
            cache.clone(),
        );
        let stats = consumer.stats();

        let token = CancellationToken::new();
        let handle = spawn(consumer, token.clone());

        advance(1).await;
        assert_eq!(stats.snapshot().errors, 1);
        assert!(cache.get().is_none());

        advance(2).await;
        assert!(cache.get().is_some());
        assert_eq!(script.lock().subscribes, 1);

        token.cancel();
        handle.await.unwrap();
        assert!(script.lock().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_resubscribes() {
        let script = Arc::new(Mutex::new(Script::default()));
        script
            .lock()
            .polls
            .push_back(Err(BrokerError::Configuration("poll before subscribe".into())));

        let consumer = PackageConsumer::new(
            config(),
            Box::new(ScriptedSubscriber(script.clone())),
            Arc::new(LastPackageCache::new()),
        );
        let stats = consumer.stats();

        let token = CancellationToken::new();
        let handle = spawn(consumer, token.clone());

        advance(1).await;
        assert_eq!(script.lock().subscribes, 1);

        advance(2).await;
        assert_eq!(script.lock().subscribes, 2);
        assert_eq!(stats.snapshot().resubscribes, 1);

        token.cancel();
        assert_ok!(handle.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_error_delay_closes() {
        let script = Arc::new(Mutex::new(Script::default()));
        script
            .lock()
            .polls
            .push_back(Err(BrokerError::UnknownTopicOrPartition(TOPIC.into())));

        let consumer = PackageConsumer::new(
            config(),
            Box::new(ScriptedSubscriber(script.clone())),
            Arc::new(LastPackageCache::new()),
        );
        let token = CancellationToken::new();
        let handle = spawn(consumer, token.clone());

        advance(1).await;
        token.cancel();
        let consumer = handle.await.unwrap();

        assert_eq!(consumer.state(), ConsumerState::Closed);
        assert!(script.lock().closed);
        // Cancelled before the resubscribe.
        assert_eq!(script.lock().subscribes, 1);
    }

    struct FailingAdmin;

    #[async_trait]
    impl TopicAdmin for FailingAdmin {
        async fn ensure_topic(&self, spec: &TopicSpec) -> BrokerResult<TopicStatus> {
            Err(BrokerError::Admin {
                topic: spec.name.clone(),
                reason: "not authorized".into(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_failure_still_subscribes() {
        let script = Arc::new(Mutex::new(Script::default()));
        let consumer = PackageConsumer::new(
            config(),
            Box::new(ScriptedSubscriber(script.clone())),
            Arc::new(LastPackageCache::new()),
        )
        .with_admin(Arc::new(FailingAdmin));

        let token = CancellationToken::new();
        let handle = spawn(consumer, token.clone());
        advance(1).await;
        assert_eq!(script.lock().subscribes, 1);

        token.cancel();
        let consumer = handle.await.unwrap();
        assert!(consumer.state().is_terminal());
    }
}
