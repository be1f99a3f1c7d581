//! Stream registry and per-stream polling loops.
//!
//! Each stream runs on its own task with a child of the manager's root
//! cancellation token. Stopping a stream cancels only that child; shutting
//! the manager down cancels the root and waits for every task.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use ratestream_common::{clamp_stream_interval, CurrencyPair, StreamId};

use crate::backoff::FailureBackoff;
use crate::cycle::StreamCycle;
use crate::error::StreamError;
use crate::metrics::SharedMetrics;
use crate::state::StreamState;

/// Point-in-time view of a registered stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub stream_id: StreamId,
    pub pairs: Vec<CurrencyPair>,
    /// Effective interval after clamping.
    pub interval_seconds: u64,
    pub state: StreamState,
    pub consecutive_failures: u32,
    pub started_at: DateTime<Utc>,
}

struct StreamHandle {
    token: CancellationToken,
    pairs: Vec<CurrencyPair>,
    interval: Duration,
    started_at: DateTime<Utc>,
    state: Arc<RwLock<StreamState>>,
    failures: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    fn info(&self, stream_id: &StreamId) -> StreamInfo {
        StreamInfo {
            stream_id: stream_id.clone(),
            pairs: self.pairs.clone(),
            interval_seconds: self.interval.as_secs(),
            state: *self.state.read(),
            consecutive_failures: self.failures.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

/// Owns every live polling stream.
pub struct StreamManager {
    cycle: Arc<dyn StreamCycle>,
    streams: Arc<DashMap<StreamId, StreamHandle>>,
    root: CancellationToken,
    metrics: SharedMetrics,
}

impl StreamManager {
    /// Create a manager that runs the given cycle for every stream.
    pub fn new(cycle: Arc<dyn StreamCycle>, metrics: SharedMetrics) -> Self {
        Self {
            cycle,
            streams: Arc::new(DashMap::new()),
            root: CancellationToken::new(),
            metrics,
        }
    }

    /// Start a stream and return immediately.
    ///
    /// The interval is clamped to the minimum; there is no ceiling.
    #[instrument(skip(self, pairs), fields(pairs = pairs.len()))]
    pub fn start(
        &self,
        pairs: Vec<CurrencyPair>,
        interval_secs: u64,
    ) -> Result<StreamInfo, StreamError> {
        if pairs.is_empty() {
            return Err(StreamError::NoPairs);
        }
        if self.root.is_cancelled() {
            return Err(StreamError::ShuttingDown);
        }

        let interval = clamp_stream_interval(interval_secs);
        let info = self.register(StreamId::generate(), pairs, interval)?;

        info!(
            stream_id = %info.stream_id,
            interval_seconds = info.interval_seconds,
            "Stream registered"
        );
        Ok(info)
    }

    fn register(
        &self,
        stream_id: StreamId,
        pairs: Vec<CurrencyPair>,
        interval: Duration,
    ) -> Result<StreamInfo, StreamError> {
        let info = match self.streams.entry(stream_id.clone()) {
            Entry::Occupied(_) => return Err(StreamError::IdCollision(stream_id)),
            Entry::Vacant(slot) => {
                let token = self.root.child_token();
                let state = Arc::new(RwLock::new(StreamState::Created));
                let failures = Arc::new(AtomicU32::new(0));

                let task = StreamTask {
                    stream_id: stream_id.clone(),
                    pairs: pairs.clone(),
                    interval,
                    cycle: self.cycle.clone(),
                    token: token.clone(),
                    state: state.clone(),
                    failures: failures.clone(),
                    metrics: self.metrics.clone(),
                    backoff: FailureBackoff::new(),
                };

                let handle = StreamHandle {
                    token,
                    pairs,
                    interval,
                    started_at: Utc::now(),
                    state,
                    failures,
                    task: tokio::spawn(task.run()),
                };
                slot.insert(handle).info(&stream_id)
            }
        };

        self.refresh_active();
        Ok(info)
    }

    /// Cancel a live stream.
    ///
    /// Returns `false` for unknown or already stopped ids.
    pub fn stop(&self, stream_id: &StreamId) -> bool {
        match self.streams.remove(stream_id) {
            Some((_, handle)) => {
                handle.token.cancel();
                self.refresh_active();
                info!(stream_id = %stream_id, "Stream stopped");
                true
            }
            None => {
                debug!(stream_id = %stream_id, "Stop requested for unknown stream");
                false
            }
        }
    }

    /// Ids of live streams, in no particular order.
    pub fn list(&self) -> Vec<StreamId> {
        self.streams.iter().map(|e| e.key().clone()).collect()
    }

    /// Details of every live stream.
    pub fn streams(&self) -> Vec<StreamInfo> {
        self.streams.iter().map(|e| e.value().info(e.key())).collect()
    }

    /// Details of one stream.
    pub fn get(&self, stream_id: &StreamId) -> Option<StreamInfo> {
        self.streams.get(stream_id).map(|h| h.info(stream_id))
    }

    /// Number of live streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if no stream is live.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Cancel every stream and wait up to `timeout` for their tasks.
    ///
    /// New streams are refused afterwards.
    pub async fn shutdown(&self, timeout: Duration) {
        self.root.cancel();

        let ids = self.list();
        let tasks: Vec<JoinHandle<()>> = ids
            .iter()
            .filter_map(|id| self.streams.remove(id))
            .map(|(_, handle)| handle.task)
            .collect();
        self.refresh_active();

        let count = tasks.len();
        match tokio::time::timeout(timeout, futures::future::join_all(tasks)).await {
            Ok(_) => info!(streams = count, "All streams drained"),
            Err(_) => warn!(
                streams = count,
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for streams to drain"
            ),
        }
    }

    fn refresh_active(&self) {
        self.metrics.set_streams_active(self.streams.len() as u64);
    }
}

/// The polling loop owned by one stream.
struct StreamTask {
    stream_id: StreamId,
    pairs: Vec<CurrencyPair>,
    interval: Duration,
    cycle: Arc<dyn StreamCycle>,
    token: CancellationToken,
    state: Arc<RwLock<StreamState>>,
    failures: Arc<AtomicU32>,
    metrics: SharedMetrics,
    backoff: FailureBackoff,
}

impl StreamTask {
    async fn run(mut self) {
        *self.state.write() = StreamState::Running;
        info!(
            stream_id = %self.stream_id,
            interval_seconds = self.interval.as_secs(),
            "Stream loop running"
        );

        // Ticks are scheduled from loop start; the first cycle runs before them.
        let first_tick = Instant::now() + self.interval;
        if self.run_cycle().await {
            let mut ticker = tokio::time::interval_at(first_tick, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = self.token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !self.run_cycle().await {
                            break;
                        }
                    }
                }
            }
        }

        *self.state.write() = StreamState::Stopped;
        info!(stream_id = %self.stream_id, "Stream loop exited");
    }

    /// Run one cycle, backing off on failure. Returns `false` once cancelled.
    async fn run_cycle(&mut self) -> bool {
        self.metrics.cycle_started();

        let result = tokio::select! {
            _ = self.token.cancelled() => return false,
            result = self.cycle.produce_once(&self.pairs) => result,
        };

        match result {
            Ok(outcome) => {
                self.backoff.reset();
                self.failures.store(0, Ordering::Relaxed);
                debug!(stream_id = %self.stream_id, outcome = ?outcome, "Stream cycle completed");
                true
            }
            Err(e) => {
                self.metrics.cycle_failed();
                let delay = self.backoff.record_failure();
                self.failures.store(self.backoff.failures(), Ordering::Relaxed);
                error!(
                    stream_id = %self.stream_id,
                    error_code = e.error_code(),
                    error = %e,
                    consecutive_failures = self.backoff.failures(),
                    backoff_secs = delay.as_secs(),
                    "Stream cycle failed, backing off"
                );

                tokio::select! {
                    _ = self.token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleOutcome;
    use crate::error::PublishError;
    use crate::metrics::PipelineMetrics;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Counts calls and fails while `failing` is set.
    #[derive(Default)]
    struct ScriptedCycle {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl ScriptedCycle {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl StreamCycle for ScriptedCycle {
        async fn produce_once(
            &self,
            _pairs: &[CurrencyPair],
        ) -> Result<CycleOutcome, StreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(StreamError::Publish(PublishError::Timeout(
                    Duration::from_secs(30),
                )))
            } else {
                Ok(CycleOutcome::Published {
                    package_id: None,
                    rates: 1,
                })
            }
        }
    }

    fn pairs() -> Vec<CurrencyPair> {
        vec![CurrencyPair::from_codes("USD", "EUR").unwrap()]
    }

    fn manager(cycle: Arc<ScriptedCycle>) -> (StreamManager, SharedMetrics) {
        let metrics = Arc::new(PipelineMetrics::new());
        (StreamManager::new(cycle, metrics.clone()), metrics)
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_clamped() {
        let (manager, _) = manager(Arc::new(ScriptedCycle::default()));

        let short = manager.start(pairs(), 10).unwrap();
        assert_eq!(short.interval_seconds, 60);

        let long = manager.start(pairs(), 600).unwrap();
        assert_eq!(long.interval_seconds, 600);
        assert_ne!(short.stream_id, long.stream_id);
    }

    #[tokio::test]
    async fn test_start_requires_pairs() {
        let (manager, _) = manager(Arc::new(ScriptedCycle::default()));
        assert!(matches!(manager.start(vec![], 60), Err(StreamError::NoPairs)));
        assert!(manager.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately_then_on_interval() {
        let cycle = Arc::new(ScriptedCycle::default());
        let (manager, _) = manager(cycle.clone());

        let info = manager.start(pairs(), 60).unwrap();
        advance(1).await;
        assert_eq!(cycle.calls(), 1);
        assert_eq!(manager.get(&info.stream_id).unwrap().state, StreamState::Running);

        advance(30).await;
        assert_eq!(cycle.calls(), 1);

        advance(60).await;
        assert_eq!(cycle.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let cycle = Arc::new(ScriptedCycle::default());
        let (manager, metrics) = manager(cycle.clone());

        let info = manager.start(pairs(), 60).unwrap();
        assert_eq!(metrics.snapshot().streams_active, 1);
        advance(1).await;

        assert!(manager.stop(&info.stream_id));
        assert!(!manager.stop(&info.stream_id));
        assert!(!manager.stop(&StreamId::generate()));
        assert!(manager.list().is_empty());
        assert_eq!(metrics.snapshot().streams_active, 0);

        advance(300).await;
        assert_eq!(cycle.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_collision_rejected() {
        let (manager, _) = manager(Arc::new(ScriptedCycle::default()));
        let id = StreamId::generate();

        manager
            .register(id.clone(), pairs(), Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            manager.register(id.clone(), pairs(), Duration::from_secs(60)),
            Err(StreamError::IdCollision(existing)) if existing == id
        ));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_and_reset_on_success() {
        let cycle = Arc::new(ScriptedCycle::default());
        cycle.set_failing(true);
        let (manager, metrics) = manager(cycle.clone());

        let id = manager.start(pairs(), 60).unwrap().stream_id;
        advance(1).await;
        assert_eq!(manager.get(&id).unwrap().consecutive_failures, 1);

        advance(60).await;
        assert_eq!(manager.get(&id).unwrap().consecutive_failures, 2);
        assert_eq!(cycle.calls(), 2);

        cycle.set_failing(false);
        advance(60).await;
        assert_eq!(manager.get(&id).unwrap().consecutive_failures, 0);
        assert_eq!(cycle.calls(), 3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_total, 3);
        assert_eq!(snapshot.cycles_failed, 2);
    }

    /// Takes `work` per call, fails on the scripted calls, and records when
    /// each call started.
    struct SlowCycle {
        origin: Instant,
        work: Duration,
        fail_on: Vec<bool>,
        starts: parking_lot::Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl StreamCycle for SlowCycle {
        async fn produce_once(
            &self,
            _pairs: &[CurrencyPair],
        ) -> Result<CycleOutcome, StreamError> {
            let call = {
                let mut starts = self.starts.lock();
                starts.push((Instant::now() - self.origin).as_secs());
                starts.len() - 1
            };
            tokio::time::sleep(self.work).await;
            if self.fail_on.get(call).copied().unwrap_or(false) {
                Err(StreamError::Publish(PublishError::Timeout(self.work)))
            } else {
                Ok(CycleOutcome::SkippedEmpty)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_next_cycle() {
        let cycle = Arc::new(SlowCycle {
            origin: Instant::now(),
            work: Duration::from_secs(59),
            fail_on: vec![true, true, true, false, true],
            starts: parking_lot::Mutex::new(Vec::new()),
        });
        let metrics = Arc::new(PipelineMetrics::new());
        let manager = StreamManager::new(cycle.clone(), metrics);

        manager.start(pairs(), 60).unwrap();
        advance(320).await;
        manager.shutdown(Duration::from_secs(5)).await;

        // Failures wait 2s, 4s, then 8s past the end of the cycle; the
        // success at 191s resets the next wait to 2s.
        assert_eq!(*cycle.starts.lock(), vec![0, 61, 124, 191, 251, 312]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_backoff_sleep() {
        let cycle = Arc::new(ScriptedCycle::default());
        cycle.set_failing(true);
        let metrics = Arc::new(PipelineMetrics::new());
        let manager = StreamManager::new(cycle.clone(), metrics);

        let id = StreamId::generate();
        manager
            .register(id.clone(), pairs(), Duration::from_secs(60))
            .unwrap();
        advance(1).await;

        // Mid-backoff: the first failure waits 2s.
        let state = manager
            .streams
            .get(&id)
            .map(|h| h.state.clone())
            .unwrap();
        assert!(manager.stop(&id));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*state.read(), StreamState::Stopped);
        assert_eq!(cycle.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_are_independent() {
        let cycle = Arc::new(ScriptedCycle::default());
        let (manager, _) = manager(cycle.clone());

        let a = manager.start(pairs(), 60).unwrap().stream_id;
        let b = manager.start(pairs(), 60).unwrap().stream_id;
        advance(1).await;
        assert_eq!(cycle.calls(), 2);

        manager.stop(&a);
        advance(60).await;
        assert_eq!(cycle.calls(), 3);
        assert_eq!(manager.list(), vec![b]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_and_refuses_new_streams() {
        let cycle = Arc::new(ScriptedCycle::default());
        let (manager, _) = manager(cycle.clone());

        manager.start(pairs(), 60).unwrap();
        manager.start(pairs(), 120).unwrap();
        advance(1).await;

        manager.shutdown(Duration::from_secs(10)).await;
        assert!(manager.is_empty());
        assert!(matches!(
            manager.start(pairs(), 60),
            Err(StreamError::ShuttingDown)
        ));
    }
}
