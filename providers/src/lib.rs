//! RateStream Providers
//!
//! Fetches a single exchange rate for a currency pair from one of several
//! interchangeable upstream APIs.
//!
//! # Features
//!
//! - Three-step provider contract: build URL, execute request, parse body
//! - CurrencyLayer, ExchangeRate-API and FXRatesAPI variants
//! - Startup selection of the first active configured provider
//! - `RateSource` seam so the fetch orchestrator can run against mocks
//!
//! # Example
//!
//! ```rust,ignore
//! use ratestream_providers::{ProviderSettings, RateProviderClient};
//! use ratestream_common::CurrencyPair;
//!
//! let client = RateProviderClient::from_settings(&ProviderSettings::from_env())?;
//! let rate = client.fetch(&"USD:EUR".parse::<CurrencyPair>()?).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod source;
pub mod variants;

pub use client::RateProviderClient;
pub use config::{ApiCredential, ProviderConfig, ProviderKind, ProviderSettings};
pub use error::{ProviderError, ProviderFailure, ProviderResult, ProviderSetupError};
pub use source::RateSource;
pub use variants::{CurrencyLayer, ExchangeProvider, ExchangeRateApi, FxRatesApi};

#[cfg(any(test, feature = "test-utils"))]
pub use source::MockRateSource;
