//! The rate source seam used by the fetch orchestrator.

use async_trait::async_trait;
use ratestream_common::{CurrencyPair, ExchangeRate};

use crate::error::ProviderResult;

/// Anything that can quote a single pair.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Source name for logs.
    fn name(&self) -> &str;

    /// Fetch the current rate for a pair.
    async fn fetch_rate(&self, pair: &CurrencyPair) -> ProviderResult<ExchangeRate>;
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    name: String,
    rates: dashmap::DashMap<CurrencyPair, rust_decimal::Decimal>,
    failures: dashmap::DashMap<CurrencyPair, crate::error::ProviderFailure>,
    delays: dashmap::DashMap<CurrencyPair, std::time::Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            failures: dashmap::DashMap::new(),
            delays: dashmap::DashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Quote a pair at a fixed rate.
    pub fn set_rate(&self, pair: CurrencyPair, rate: rust_decimal::Decimal) {
        self.failures.remove(&pair);
        self.rates.insert(pair, rate);
    }

    /// Make fetches for a pair fail.
    pub fn fail_pair(&self, pair: CurrencyPair, failure: crate::error::ProviderFailure) {
        self.failures.insert(pair, failure);
    }

    /// Delay fetches for a pair.
    pub fn delay_pair(&self, pair: CurrencyPair, delay: std::time::Duration) {
        self.delays.insert(pair, delay);
    }

    /// Number of fetches attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rate(&self, pair: &CurrencyPair) -> ProviderResult<ExchangeRate> {
        use crate::error::{ProviderError, ProviderFailure};

        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = self.delays.get(pair).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.get(pair).map(|f| f.clone());
        if let Some(failure) = failure {
            return Err(ProviderError::new(&self.name, pair.clone(), failure));
        }

        let rate = self.rates.get(pair).map(|r| *r).ok_or_else(|| {
            ProviderError::new(
                &self.name,
                pair.clone(),
                ProviderFailure::Parse("no rate configured".to_string()),
            )
        })?;

        ExchangeRate::new(pair.clone(), rate).map_err(|e| {
            ProviderError::new(&self.name, pair.clone(), ProviderFailure::Parse(e.to_string()))
        })
    }
}
