//! RateStream Package Store
//!
//! Persistence seam for assembled exchange packages, plus the read queries
//! served from it: the latest package of the last day and the latest rate
//! for a single pair.

pub mod error;
pub mod memory;
pub mod queries;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryPackageStore;
pub use queries::PackageQueries;
pub use store::{PackageFilter, PackageStore};
