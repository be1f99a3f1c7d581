//! Read queries over stored packages.

use std::sync::Arc;

use tracing::instrument;

use ratestream_common::{constants, time, Currency, CurrencyPair, ExchangePackage, ExchangeRate};

use crate::error::{StoreError, StoreResult};
use crate::store::PackageStore;

/// Read-side queries answered from the package store.
#[derive(Clone)]
pub struct PackageQueries {
    store: Arc<dyn PackageStore>,
}

impl PackageQueries {
    /// Create queries over a store.
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    /// The most recent package assembled within the last 24 hours.
    #[instrument(skip(self))]
    pub async fn last_package(&self) -> StoreResult<ExchangePackage> {
        let window = constants::last_package_window();
        self.store
            .find_latest(&|p| time::is_within(p.time(), window))
            .await?
            .ok_or_else(|| StoreError::NotFound("Package".to_string()))
    }

    /// The most recent stored rate for a pair, from any package age.
    #[instrument(skip(self))]
    pub async fn last_pair_rate(&self, from: &str, to: &str) -> StoreResult<ExchangeRate> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "from and to currencies are required".to_string(),
            ));
        }
        let pair = CurrencyPair::new(
            Currency::new(from).map_err(|e| StoreError::InvalidArgument(e.to_string()))?,
            Currency::new(to).map_err(|e| StoreError::InvalidArgument(e.to_string()))?,
        );

        let package = self
            .store
            .find_latest(&|p| p.contains_pair(&pair))
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Rate for {pair}")))?;

        package
            .rate_for(&pair)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Rate for {pair}")))
    }
}
