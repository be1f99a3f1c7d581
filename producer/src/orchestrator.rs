//! Concurrent rate fetching.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use ratestream_common::{CurrencyPair, ExchangePackage};
use ratestream_providers::RateSource;
use ratestream_store::PackageStore;

use crate::error::FetchError;
use crate::metrics::SharedMetrics;

/// Default number of pair fetches in flight per cycle.
pub const DEFAULT_MAX_PARALLELISM: usize = 8;

/// Fans out one fetch per pair and assembles the successes into a package.
///
/// A failing pair is logged and left out; it never fails the batch. The
/// assembled package is persisted before it is returned, and a store
/// failure does fail the cycle.
pub struct RateFetchOrchestrator {
    source: Arc<dyn RateSource>,
    store: Arc<dyn PackageStore>,
    max_parallelism: usize,
    metrics: SharedMetrics,
}

impl RateFetchOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        source: Arc<dyn RateSource>,
        store: Arc<dyn PackageStore>,
        max_parallelism: usize,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            source,
            store,
            max_parallelism: max_parallelism.max(1),
            metrics,
        }
    }

    /// Fetch every pair and persist the resulting package.
    ///
    /// Rates appear in completion order. Duplicate pairs are fetched once.
    #[instrument(skip(self, pairs), fields(requested = pairs.len()))]
    pub async fn document_package(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<ExchangePackage, FetchError> {
        if pairs.is_empty() {
            return Err(FetchError::EmptyRequest);
        }

        let mut seen = HashSet::new();
        let unique: Vec<CurrencyPair> = pairs
            .iter()
            .filter(|p| seen.insert(*p))
            .cloned()
            .collect();

        let results: Vec<_> = stream::iter(unique)
            .map(|pair| {
                let source = self.source.clone();
                async move {
                    let result = source.fetch_rate(&pair).await;
                    (pair, result)
                }
            })
            .buffer_unordered(self.max_parallelism)
            .collect()
            .await;

        let mut rates = Vec::with_capacity(results.len());
        for (pair, result) in results {
            match result {
                Ok(rate) => rates.push(rate),
                Err(e) => {
                    self.metrics.pair_fetch_failed();
                    warn!(
                        pair = %pair,
                        provider = %e.provider,
                        error_code = e.error_code(),
                        transient = e.is_transient(),
                        error = %e,
                        "Rate fetch failed, pair left out of package"
                    );
                }
            }
        }

        let stored = self.store.insert(ExchangePackage::assemble(rates)).await?;

        info!(
            package_id = ?stored.id(),
            rates = stored.len(),
            source = self.source.name(),
            "Package documented"
        );
        Ok(stored)
    }
}
