//! RateStream Producer
//!
//! Fetches rates from the configured provider, assembles them into
//! packages and publishes them to the broker on per-stream schedules.
//!
//! # Components
//!
//! - [`RateFetchOrchestrator`] fans out pair fetches and persists the package
//! - [`PackageProducer`] encodes and publishes packages
//! - [`StreamManager`] owns the polling loops and their backoff state
//! - [`RateStreamService`] is the control surface used by binaries

pub mod backoff;
pub mod config;
pub mod cycle;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod publisher;
pub mod service;
pub mod state;
pub mod stream_manager;

pub use backoff::FailureBackoff;
pub use config::ProducerConfig;
pub use cycle::{CycleOutcome, PublishingCycle, StreamCycle};
pub use error::{ControlError, FetchError, PublishError, StreamError};
pub use metrics::{MetricsSnapshot, PipelineMetrics, SharedMetrics};
pub use orchestrator::{RateFetchOrchestrator, DEFAULT_MAX_PARALLELISM};
pub use publisher::PackageProducer;
pub use service::{InstanceInfo, RateStreamService, StopOutcome, StreamStarted};
pub use state::StreamState;
pub use stream_manager::{StreamInfo, StreamManager};
