//! RateStream Consumer
//!
//! Subscribes to the package topic and keeps the most recent package in a
//! single-slot cache for synchronous reads.

pub mod cache;
pub mod config;
pub mod consumer;
pub mod state;
pub mod stats;

pub use cache::{LastPackageCache, SharedCache};
pub use config::ConsumerConfig;
pub use consumer::PackageConsumer;
pub use state::ConsumerState;
pub use stats::{ConsumerStats, SharedStats, StatsSnapshot};
