//! Provider variants.
//!
//! Every variant supplies the same three steps: build the request URL from
//! the credential and pair, execute the request and return the raw body,
//! then parse the provider's JSON shape into a decimal rate. The client
//! composes the steps; adding a provider means adding a type here.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, Url};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

use ratestream_common::CurrencyPair;

use crate::config::ApiCredential;
use crate::error::ProviderFailure;

/// The three-step provider contract.
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Step 1: build the request URL.
    fn build_url(&self, credential: &ApiCredential, pair: &CurrencyPair)
        -> Result<Url, ProviderFailure>;

    /// Step 2: execute the request and return the raw body.
    async fn execute(
        &self,
        http: &Client,
        url: Url,
        credential: &ApiCredential,
    ) -> Result<String, ProviderFailure>;

    /// Step 3: extract the rate from the body.
    fn parse(&self, body: &str, pair: &CurrencyPair) -> Result<Decimal, ProviderFailure>;
}

/// currencylayer.com: `live` endpoint keyed by query parameter, rates nested
/// under `quotes` as `{FROM}{TO}`.
#[derive(Debug, Clone)]
pub struct CurrencyLayer {
    base_url: String,
}

impl CurrencyLayer {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.currencylayer.com";

    /// Point the variant at a different host.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for CurrencyLayer {
    fn default() -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl ExchangeProvider for CurrencyLayer {
    fn name(&self) -> &'static str {
        "currencylayer"
    }

    fn build_url(
        &self,
        credential: &ApiCredential,
        pair: &CurrencyPair,
    ) -> Result<Url, ProviderFailure> {
        Url::parse_with_params(
            &endpoint(&self.base_url, "live"),
            &[
                ("access_key", credential.expose()),
                ("currencies", pair.to().code()),
                ("source", pair.from().code()),
                ("format", "1"),
            ],
        )
        .map_err(|e| ProviderFailure::InvalidRequest(e.to_string()))
    }

    async fn execute(
        &self,
        http: &Client,
        url: Url,
        _credential: &ApiCredential,
    ) -> Result<String, ProviderFailure> {
        let response = http.get(url).send().await.map_err(transport)?;
        lenient_body(self.name(), response).await
    }

    fn parse(&self, body: &str, pair: &CurrencyPair) -> Result<Decimal, ProviderFailure> {
        let json = parse_json(body)?;
        let key = format!("{}{}", pair.from().code(), pair.to().code());
        let value = json
            .get("quotes")
            .and_then(|quotes| quotes.get(&key))
            .ok_or_else(|| ProviderFailure::Parse(format!("missing quotes.{key}")))?;
        decimal_from_value(value)
    }
}

/// exchangerate-api.com: path-templated pair lookup with a flat
/// `conversion_rate` field. Non-success statuses are raised, not swallowed.
#[derive(Debug, Clone)]
pub struct ExchangeRateApi {
    base_url: String,
}

impl ExchangeRateApi {
    pub const DEFAULT_BASE_URL: &'static str = "https://v6.exchangerate-api.com";

    /// Point the variant at a different host.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for ExchangeRateApi {
    fn default() -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl ExchangeProvider for ExchangeRateApi {
    fn name(&self) -> &'static str {
        "exchangerate"
    }

    fn build_url(
        &self,
        credential: &ApiCredential,
        pair: &CurrencyPair,
    ) -> Result<Url, ProviderFailure> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| ProviderFailure::InvalidRequest(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderFailure::InvalidRequest(format!("cannot extend {}", self.base_url)))?
            .pop_if_empty()
            .extend([
                "v6",
                credential.expose(),
                "pair",
                pair.from().code(),
                pair.to().code(),
            ]);
        Ok(url)
    }

    async fn execute(
        &self,
        http: &Client,
        url: Url,
        _credential: &ApiCredential,
    ) -> Result<String, ProviderFailure> {
        let response = http.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderFailure::Status(status.as_u16()));
        }
        response.text().await.map_err(transport)
    }

    fn parse(&self, body: &str, _pair: &CurrencyPair) -> Result<Decimal, ProviderFailure> {
        let json = parse_json(body)?;
        let value = json
            .get("conversion_rate")
            .ok_or_else(|| ProviderFailure::Parse("missing conversion_rate".to_string()))?;
        decimal_from_value(value)
    }
}

/// fxratesapi.com: base/symbols query with bearer auth, rates nested under
/// `rates` keyed by target code.
#[derive(Debug, Clone)]
pub struct FxRatesApi {
    base_url: String,
}

impl FxRatesApi {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.fxratesapi.com";

    /// Point the variant at a different host.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for FxRatesApi {
    fn default() -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl ExchangeProvider for FxRatesApi {
    fn name(&self) -> &'static str {
        "fxratesapi"
    }

    fn build_url(
        &self,
        _credential: &ApiCredential,
        pair: &CurrencyPair,
    ) -> Result<Url, ProviderFailure> {
        Url::parse_with_params(
            &endpoint(&self.base_url, "latest"),
            &[("base", pair.from().code()), ("symbols", pair.to().code())],
        )
        .map_err(|e| ProviderFailure::InvalidRequest(e.to_string()))
    }

    async fn execute(
        &self,
        http: &Client,
        url: Url,
        credential: &ApiCredential,
    ) -> Result<String, ProviderFailure> {
        let response = http
            .get(url)
            .bearer_auth(credential.expose())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;
        lenient_body(self.name(), response).await
    }

    fn parse(&self, body: &str, pair: &CurrencyPair) -> Result<Decimal, ProviderFailure> {
        let json = parse_json(body)?;
        let value = json
            .get("rates")
            .and_then(|rates| rates.get(pair.to().code()))
            .ok_or_else(|| ProviderFailure::Parse(format!("missing rates.{}", pair.to())))?;
        decimal_from_value(value)
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Request URLs can carry the credential, so the URL is stripped first.
fn transport(e: reqwest::Error) -> ProviderFailure {
    ProviderFailure::Transport(e.without_url().to_string())
}

/// Read the body, treating a non-success status as an empty body.
async fn lenient_body(provider: &str, response: Response) -> Result<String, ProviderFailure> {
    let status = response.status();
    if status.is_success() {
        return response.text().await.map_err(transport);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(
        provider,
        status = status.as_u16(),
        body = %body,
        "Provider returned non-success status"
    );
    Ok(String::new())
}

fn parse_json(body: &str) -> Result<Value, ProviderFailure> {
    if body.trim().is_empty() {
        return Err(ProviderFailure::Parse("empty response body".to_string()));
    }
    serde_json::from_str(body).map_err(|e| ProviderFailure::Parse(e.to_string()))
}

/// Read a JSON number or numeric string as an exact decimal.
fn decimal_from_value(value: &Value) -> Result<Decimal, ProviderFailure> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(ProviderFailure::Parse(format!("rate is not numeric: {other}"))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| ProviderFailure::Parse(format!("rate is not a decimal: {text}")))
}
