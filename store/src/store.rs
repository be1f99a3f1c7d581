//! The package store seam.

use async_trait::async_trait;
use ratestream_common::ExchangePackage;

use crate::error::StoreResult;

/// Predicate used by `find_latest`.
pub type PackageFilter<'a> = &'a (dyn Fn(&ExchangePackage) -> bool + Send + Sync);

/// Persistence for assembled packages.
///
/// Implementations assign the package id on insert and return the stored
/// copy. The rest of the pipeline only sees packages through this trait.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Persist a package, returning it with its assigned id.
    async fn insert(&self, package: ExchangePackage) -> StoreResult<ExchangePackage>;

    /// Return the most recent package (by `time`) matching the filter.
    async fn find_latest(&self, filter: PackageFilter<'_>) -> StoreResult<Option<ExchangePackage>>;

    /// Number of stored packages.
    async fn count(&self) -> StoreResult<usize>;
}
