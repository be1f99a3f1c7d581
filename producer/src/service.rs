//! Control surface over the stream manager, the orchestrator and the
//! read queries.
//!
//! Every operation reports a structured outcome or a [`ControlError`];
//! transport-level failures never leak to callers as raw errors.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use ratestream_broker::RunMode;
use ratestream_common::{constants, CurrencyPair, ExchangePackage, ExchangeRate, StreamId};
use ratestream_store::PackageQueries;

use crate::cycle::PublishingCycle;
use crate::error::ControlError;
use crate::metrics::SharedMetrics;
use crate::orchestrator::RateFetchOrchestrator;
use crate::publisher::PackageProducer;
use crate::stream_manager::{StreamInfo, StreamManager};

/// Identifies this process among replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub pid: u32,
}

impl InstanceInfo {
    /// Stamp the current process.
    pub fn current() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            pid: std::process::id(),
        }
    }
}

/// A stream was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStarted {
    pub stream_id: StreamId,
    /// Effective interval after clamping.
    pub interval_seconds: u64,
    pub pairs: Vec<CurrencyPair>,
}

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StopOutcome {
    Stopped { stream_id: StreamId },
    NotFound { stream_id: StreamId, active: Vec<StreamId> },
}

struct BrokerPipeline {
    streams: Arc<StreamManager>,
    producer: Arc<PackageProducer>,
}

/// Entry points consumed by binaries and outer surfaces.
pub struct RateStreamService {
    orchestrator: Arc<RateFetchOrchestrator>,
    queries: PackageQueries,
    pipeline: Option<BrokerPipeline>,
    instance: InstanceInfo,
}

impl RateStreamService {
    /// Service without a broker. Streams are refused.
    pub fn direct(orchestrator: Arc<RateFetchOrchestrator>, queries: PackageQueries) -> Self {
        Self {
            orchestrator,
            queries,
            pipeline: None,
            instance: InstanceInfo::current(),
        }
    }

    /// Service that streams packages through the given producer.
    pub fn broker(
        orchestrator: Arc<RateFetchOrchestrator>,
        producer: Arc<PackageProducer>,
        queries: PackageQueries,
        metrics: SharedMetrics,
    ) -> Self {
        let cycle = Arc::new(PublishingCycle::new(
            orchestrator.clone(),
            producer.clone(),
            metrics.clone(),
        ));
        Self {
            orchestrator,
            queries,
            pipeline: Some(BrokerPipeline {
                streams: Arc::new(StreamManager::new(cycle, metrics)),
                producer,
            }),
            instance: InstanceInfo::current(),
        }
    }

    /// Which mode this service runs in.
    pub fn run_mode(&self) -> RunMode {
        if self.pipeline.is_some() {
            RunMode::Broker
        } else {
            RunMode::Direct
        }
    }

    /// Process identity.
    pub fn instance(&self) -> &InstanceInfo {
        &self.instance
    }

    /// Start a polling stream. Uses the default interval when none is given.
    #[instrument(skip(self, pairs), fields(pairs = pairs.len()))]
    pub fn start_stream(
        &self,
        pairs: Vec<CurrencyPair>,
        interval_secs: Option<u64>,
    ) -> Result<StreamStarted, ControlError> {
        let pipeline = self.pipeline.as_ref().ok_or(ControlError::NotBrokerMode)?;
        if pairs.is_empty() {
            return Err(ControlError::InvalidRequest(
                "at least one currency pair is required".to_string(),
            ));
        }

        let interval =
            interval_secs.unwrap_or_else(|| constants::default_stream_interval().as_secs());
        let info = pipeline.streams.start(pairs, interval)?;

        Ok(StreamStarted {
            stream_id: info.stream_id,
            interval_seconds: info.interval_seconds,
            pairs: info.pairs,
        })
    }

    /// Stop a stream by id. Unknown ids report the live set.
    #[instrument(skip(self))]
    pub fn stop_stream(&self, stream_id: &str) -> Result<StopOutcome, ControlError> {
        let pipeline = self.pipeline.as_ref().ok_or(ControlError::NotBrokerMode)?;
        let stream_id =
            StreamId::parse(stream_id).map_err(|e| ControlError::InvalidRequest(e.to_string()))?;

        if pipeline.streams.stop(&stream_id) {
            Ok(StopOutcome::Stopped { stream_id })
        } else {
            Ok(StopOutcome::NotFound {
                stream_id,
                active: pipeline.streams.list(),
            })
        }
    }

    /// Live stream ids. Empty in direct mode.
    pub fn list_streams(&self) -> Vec<StreamId> {
        self.pipeline
            .as_ref()
            .map(|p| p.streams.list())
            .unwrap_or_default()
    }

    /// Live stream details. Empty in direct mode.
    pub fn stream_details(&self) -> Vec<StreamInfo> {
        self.pipeline
            .as_ref()
            .map(|p| p.streams.streams())
            .unwrap_or_default()
    }

    /// Fetch and persist a package now, bypassing streams and the broker.
    pub async fn fetch_once(&self, pairs: &[CurrencyPair]) -> Result<ExchangePackage, ControlError> {
        Ok(self.orchestrator.document_package(pairs).await?)
    }

    /// Most recent stored package from the last day.
    pub async fn last_package(&self) -> Result<ExchangePackage, ControlError> {
        Ok(self.queries.last_package().await?)
    }

    /// Most recent stored rate for a pair.
    pub async fn last_pair_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ControlError> {
        Ok(self.queries.last_pair_rate(from, to).await?)
    }

    /// Stop every stream, then flush the producer.
    pub async fn shutdown(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline
                .streams
                .shutdown(constants::stream_drain_timeout())
                .await;
            pipeline.producer.shutdown().await;
        }
        info!(instance_id = %self.instance.instance_id, "Service shut down");
    }
}
