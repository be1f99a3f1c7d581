//! Single-slot cache of the most recent package.

use std::sync::Arc;

use parking_lot::Mutex;

use ratestream_common::ExchangePackage;

/// Holds the last package received from the broker.
///
/// Packages are built off the slot and swapped in whole, so a reader sees
/// either the previous package or the new one, never a mix.
#[derive(Debug, Default)]
pub struct LastPackageCache {
    slot: Mutex<Option<Arc<ExchangePackage>>>,
}

impl LastPackageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last package set, if any.
    pub fn get(&self) -> Option<Arc<ExchangePackage>> {
        self.slot.lock().clone()
    }

    /// Replace the cached package.
    pub fn set(&self, package: ExchangePackage) {
        let package = Arc::new(package);
        *self.slot.lock() = Some(package);
    }

    /// Check if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

/// Shared cache instance.
pub type SharedCache = Arc<LastPackageCache>;
