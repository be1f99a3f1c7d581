//! RateStream Wire Protocol
//!
//! Canonical JSON encoding of exchange packages as they travel through the
//! broker. The producer and the consumer both go through this crate so the
//! two sides always agree on field names and decimal handling.

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;
