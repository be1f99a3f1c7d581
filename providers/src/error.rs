//! Provider error types.

use ratestream_common::CurrencyPair;
use thiserror::Error;

/// Which step of a provider fetch failed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    /// The request URL could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP call did not complete.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The body did not have the expected shape.
    #[error("unparseable response: {0}")]
    Parse(String),
}

/// A single pair fetch failed.
///
/// Carries the provider name and the pair so the orchestrator can log the
/// failure and move on to the other pairs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch exchange rate ({}-{}) from {provider}: {cause}", .pair.from(), .pair.to())]
pub struct ProviderError {
    /// Provider that was called.
    pub provider: String,
    /// Pair that was requested.
    pub pair: CurrencyPair,
    /// Underlying failure.
    pub cause: ProviderFailure,
}

impl ProviderError {
    /// Create a new provider error.
    pub fn new(provider: impl Into<String>, pair: CurrencyPair, cause: ProviderFailure) -> Self {
        Self {
            provider: provider.into(),
            pair,
            cause,
        }
    }

    /// Get error code for structured logging.
    pub fn error_code(&self) -> &'static str {
        match self.cause {
            ProviderFailure::InvalidRequest(_) => "PROVIDER_INVALID_REQUEST",
            ProviderFailure::Transport(_) => "PROVIDER_TRANSPORT",
            ProviderFailure::Status(_) => "PROVIDER_STATUS",
            ProviderFailure::Parse(_) => "PROVIDER_PARSE",
        }
    }

    /// Check if retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self.cause {
            ProviderFailure::Transport(_) => true,
            ProviderFailure::Status(status) => status == 429 || status >= 500,
            ProviderFailure::InvalidRequest(_) | ProviderFailure::Parse(_) => false,
        }
    }
}

/// Provider selection failed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderSetupError {
    /// No providers configured at all.
    #[error("No exchange providers configured")]
    NoProviders,

    /// Providers configured but none is marked active.
    #[error("All providers inactive")]
    AllInactive,

    /// The active entry has an empty provider name.
    #[error("Provider name cannot be empty")]
    EmptyName,

    /// The active entry names a provider that does not exist.
    #[error("Unknown exchange provider: {0}")]
    UnknownProvider(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

/// Result type for provider fetches.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ratestream_common::Currency;

    #[test]
    fn test_error_message_names_pair_and_provider() {
        let err = ProviderError::new(
            "currencylayer",
            CurrencyPair::new(Currency::usd(), Currency::eur()),
            ProviderFailure::Status(503),
        );
        assert_eq!(
            err.to_string(),
            "Failed to fetch exchange rate (USD-EUR) from currencylayer: unexpected status 503"
        );
        assert_eq!(err.error_code(), "PROVIDER_STATUS");
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_failures_not_transient() {
        let err = ProviderError::new(
            "fxratesapi",
            CurrencyPair::new(Currency::usd(), Currency::eur()),
            ProviderFailure::Parse("missing rates".into()),
        );
        assert!(!err.is_transient());
    }
}
