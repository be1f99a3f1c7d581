//! Rate provider client.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use ratestream_common::{CurrencyPair, ExchangeRate};

use crate::config::{select_active, ApiCredential, ProviderSettings};
use crate::error::{ProviderError, ProviderFailure, ProviderResult, ProviderSetupError};
use crate::source::RateSource;
use crate::variants::ExchangeProvider;

/// Fetches rates from the provider selected at startup.
///
/// Runs the variant's three steps in order and wraps whichever one fails
/// into a single [`ProviderError`] naming the provider and pair.
#[derive(Clone)]
pub struct RateProviderClient {
    provider: Arc<dyn ExchangeProvider>,
    credential: ApiCredential,
    http: reqwest::Client,
}

impl RateProviderClient {
    /// Create a client for an explicit provider.
    pub fn new(
        provider: Arc<dyn ExchangeProvider>,
        credential: ApiCredential,
        http: reqwest::Client,
    ) -> Self {
        Self {
            provider,
            credential,
            http,
        }
    }

    /// Select the first active configured provider and build a client for it.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderSetupError> {
        let (kind, entry) = select_active(&settings.providers)?;

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderSetupError::HttpClient(e.to_string()))?;

        info!(provider = %kind, "Exchange provider selected");

        Ok(Self::new(
            kind.build(settings.base_url.as_deref()),
            entry.key.clone(),
            http,
        ))
    }

    /// Name of the selected provider.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Fetch the current rate for a pair.
    #[instrument(skip(self, pair), fields(provider = self.provider.name(), pair = %pair))]
    pub async fn fetch(&self, pair: &CurrencyPair) -> ProviderResult<ExchangeRate> {
        let wrap = |cause| ProviderError::new(self.provider.name(), pair.clone(), cause);

        let url = self.provider.build_url(&self.credential, pair).map_err(wrap)?;
        let body = self
            .provider
            .execute(&self.http, url, &self.credential)
            .await
            .map_err(wrap)?;
        let rate = self.provider.parse(&body, pair).map_err(wrap)?;

        debug!(rate = %rate, "Fetched rate");

        ExchangeRate::new(pair.clone(), rate)
            .map_err(|e| wrap(ProviderFailure::Parse(e.to_string())))
    }
}

#[async_trait]
impl RateSource for RateProviderClient {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn fetch_rate(&self, pair: &CurrencyPair) -> ProviderResult<ExchangeRate> {
        self.fetch(pair).await
    }
}
