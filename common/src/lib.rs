//! RateStream Common Types
//!
//! This crate contains the model shared by every stage of the pipeline:
//! currency codes and pairs, exchange rates, timestamped packages, and the
//! identifiers handed out by the stream manager, the broker and the store.

pub mod identifiers;
pub mod currency;
pub mod package;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use currency::*;
pub use package::*;
pub use error::*;
pub use time::*;
