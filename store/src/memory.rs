//! In-process package store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::{debug, instrument};

use ratestream_common::{ExchangePackage, PackageId};

use crate::error::StoreResult;
use crate::store::{PackageFilter, PackageStore};

/// Package store backed by a vector in memory.
///
/// Used when no external database is configured and in tests. Packages are
/// kept in insertion order; `find_latest` still orders by package time.
/// Nothing survives a restart. A bounded store evicts the oldest inserts
/// once full, so queries only see the retained packages.
#[derive(Default)]
pub struct InMemoryPackageStore {
    packages: RwLock<VecDeque<ExchangePackage>>,
    capacity: Option<usize>,
}

impl InMemoryPackageStore {
    /// Default capacity for [`InMemoryPackageStore::bounded`] stores in binaries.
    pub const DEFAULT_RETAINED_PACKAGES: usize = 10_000;

    /// Create an empty store that keeps every package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that keeps at most `capacity` packages.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            packages: RwLock::new(VecDeque::new()),
            capacity: Some(capacity.max(1)),
        }
    }
}

#[async_trait]
impl PackageStore for InMemoryPackageStore {
    #[instrument(skip(self, package), fields(rates = package.len()))]
    async fn insert(&self, package: ExchangePackage) -> StoreResult<ExchangePackage> {
        let stored = package.persisted(PackageId::new());
        {
            let mut packages = self.packages.write();
            packages.push_back(stored.clone());
            if let Some(capacity) = self.capacity {
                while packages.len() > capacity {
                    packages.pop_front();
                }
            }
        }

        debug!(package_id = ?stored.id(), "Package stored");
        Ok(stored)
    }

    async fn find_latest(&self, filter: PackageFilter<'_>) -> StoreResult<Option<ExchangePackage>> {
        let packages = self.packages.read();
        Ok(packages
            .iter()
            .filter(|p| filter(p))
            .max_by_key(|p| p.time())
            .cloned())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.packages.read().len())
    }
}
