//! Provider configuration and startup selection.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ratestream_common::constants;

use crate::error::ProviderSetupError;
use crate::variants::{CurrencyLayer, ExchangeProvider, ExchangeRateApi, FxRatesApi};

/// Provider API key. Never printed.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ApiCredential(String);

impl ApiCredential {
    /// Wrap a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Expose the key for request building.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(***)")
    }
}

/// Supported provider variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// currencylayer.com live quotes.
    CurrencyLayer,
    /// exchangerate-api.com pair lookup.
    ExchangeRateApi,
    /// fxratesapi.com latest rates.
    FxRatesApi,
}

impl ProviderKind {
    /// Configuration name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::CurrencyLayer => "currencylayer",
            ProviderKind::ExchangeRateApi => "exchangerate",
            ProviderKind::FxRatesApi => "fxratesapi",
        }
    }

    /// Build the variant, optionally against a different base URL.
    pub fn build(&self, base_url: Option<&str>) -> Arc<dyn ExchangeProvider> {
        match (self, base_url) {
            (ProviderKind::CurrencyLayer, None) => Arc::new(CurrencyLayer::default()),
            (ProviderKind::CurrencyLayer, Some(url)) => Arc::new(CurrencyLayer::with_base_url(url)),
            (ProviderKind::ExchangeRateApi, None) => Arc::new(ExchangeRateApi::default()),
            (ProviderKind::ExchangeRateApi, Some(url)) => {
                Arc::new(ExchangeRateApi::with_base_url(url))
            }
            (ProviderKind::FxRatesApi, None) => Arc::new(FxRatesApi::default()),
            (ProviderKind::FxRatesApi, Some(url)) => Arc::new(FxRatesApi::with_base_url(url)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Case-insensitive lookup by configuration name.
impl FromStr for ProviderKind {
    type Err = ProviderSetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(ProviderSetupError::EmptyName);
        }
        match name.to_ascii_lowercase().as_str() {
            "currencylayer" => Ok(ProviderKind::CurrencyLayer),
            "exchangerate" => Ok(ProviderKind::ExchangeRateApi),
            "fxratesapi" => Ok(ProviderKind::FxRatesApi),
            _ => Err(ProviderSetupError::UnknownProvider(name.to_string())),
        }
    }
}

/// One configured provider entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, e.g. `currencylayer`.
    #[serde(alias = "Provider")]
    pub provider: String,
    /// API key.
    #[serde(alias = "Key", deserialize_with = "deserialize_credential")]
    pub key: ApiCredential,
    /// Whether this entry may be selected.
    #[serde(alias = "Active", default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn deserialize_credential<'de, D>(deserializer: D) -> Result<ApiCredential, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(ApiCredential::new)
}

impl ProviderConfig {
    /// Create an active entry.
    pub fn active(provider: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            key: ApiCredential::new(key),
            active: true,
        }
    }
}

/// Pick the first active entry and resolve its variant.
pub fn select_active(
    providers: &[ProviderConfig],
) -> Result<(ProviderKind, &ProviderConfig), ProviderSetupError> {
    if providers.is_empty() {
        return Err(ProviderSetupError::NoProviders);
    }
    let entry = providers
        .iter()
        .find(|p| p.active)
        .ok_or(ProviderSetupError::AllInactive)?;
    let kind = entry.provider.parse::<ProviderKind>()?;
    Ok((kind, entry))
}

/// Provider client settings.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Configured providers, in priority order.
    pub providers: Vec<ProviderConfig>,
    /// Outbound request timeout.
    pub request_timeout: Duration,
    /// Override for the selected provider's base URL.
    pub base_url: Option<String>,
    /// Environment values that could not be parsed.
    pub env_errors: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            request_timeout: constants::provider_request_timeout(),
            base_url: None,
            env_errors: Vec::new(),
        }
    }
}

impl ProviderSettings {
    /// Load settings from environment variables.
    ///
    /// `EXCHANGE_PROVIDERS` holds a JSON list of entries. When it is unset,
    /// `EXCHANGE_PROVIDER` and `EXCHANGE_API_KEY` define a single active entry.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(raw) = lookup("EXCHANGE_PROVIDERS") {
            // The raw value holds keys, so only the position is reported.
            match serde_json::from_str::<Vec<ProviderConfig>>(&raw) {
                Ok(providers) => settings.providers = providers,
                Err(e) => settings.env_errors.push(format!(
                    "EXCHANGE_PROVIDERS: malformed JSON at line {} column {}",
                    e.line(),
                    e.column()
                )),
            }
        } else if let Some(provider) = lookup("EXCHANGE_PROVIDER") {
            let key = lookup("EXCHANGE_API_KEY").unwrap_or_default();
            settings.providers.push(ProviderConfig::active(provider, key));
        }

        if let Some(secs) = lookup("PROVIDER_REQUEST_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => settings.request_timeout = Duration::from_secs(secs),
                Err(e) => settings
                    .env_errors
                    .push(format!("PROVIDER_REQUEST_TIMEOUT_SECS={secs}: {e}")),
            }
        }

        if let Some(url) = lookup("PROVIDER_BASE_URL") {
            settings.base_url = Some(url);
        }

        settings
    }

    /// Validate settings, including provider selection.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(e) = self.env_errors.first() {
            return Err(format!("Invalid environment value {e}"));
        }
        if self.request_timeout.is_zero() {
            return Err("Provider request timeout cannot be 0".to_string());
        }
        select_active(&self.providers).map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup_case_insensitive() {
        assert_eq!(
            "CurrencyLayer".parse::<ProviderKind>().unwrap(),
            ProviderKind::CurrencyLayer
        );
        assert_eq!(
            " EXCHANGERATE ".parse::<ProviderKind>().unwrap(),
            ProviderKind::ExchangeRateApi
        );
        assert_eq!(
            "fxratesapi".parse::<ProviderKind>().unwrap(),
            ProviderKind::FxRatesApi
        );
    }

    #[test]
    fn test_kind_lookup_failures() {
        assert_eq!(
            "".parse::<ProviderKind>(),
            Err(ProviderSetupError::EmptyName)
        );
        assert_eq!(
            "openexchange".parse::<ProviderKind>(),
            Err(ProviderSetupError::UnknownProvider("openexchange".into()))
        );
    }

    #[test]
    fn test_select_first_active() {
        let providers = vec![
            ProviderConfig {
                active: false,
                ..ProviderConfig::active("currencylayer", "a")
            },
            ProviderConfig::active("fxratesapi", "b"),
            ProviderConfig::active("exchangerate", "c"),
        ];
        let (kind, entry) = select_active(&providers).unwrap();
        assert_eq!(kind, ProviderKind::FxRatesApi);
        assert_eq!(entry.key.expose(), "b");
    }

    #[test]
    fn test_select_errors() {
        assert_eq!(select_active(&[]).unwrap_err(), ProviderSetupError::NoProviders);

        let inactive = vec![ProviderConfig {
            active: false,
            ..ProviderConfig::active("fxratesapi", "k")
        }];
        assert_eq!(
            select_active(&inactive).unwrap_err(),
            ProviderSetupError::AllInactive
        );

        let unknown = vec![ProviderConfig::active("bogus", "k")];
        assert!(matches!(
            select_active(&unknown),
            Err(ProviderSetupError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_config_list_deserialize() {
        let raw = r#"[
            {"Provider": "CurrencyLayer", "Key": "k1", "Active": false},
            {"provider": "exchangerate", "key": "k2"}
        ]"#;
        let providers: Vec<ProviderConfig> = serde_json::from_str(raw).unwrap();
        assert!(!providers[0].active);
        assert!(providers[1].active);
        assert_eq!(providers[1].key.expose(), "k2");
    }

    #[test]
    fn test_credential_redacted() {
        let entry = ProviderConfig::active("fxratesapi", "super-secret");
        let printed = format!("{:?}", entry);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_settings_validate() {
        let mut settings = ProviderSettings::default();
        assert!(settings.validate().is_err());

        settings.providers.push(ProviderConfig::active("currencylayer", "k"));
        assert!(settings.validate().is_ok());

        settings.request_timeout = Duration::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_malformed_provider_list_is_reported() {
        let settings = ProviderSettings::from_lookup(|key| match key {
            "EXCHANGE_PROVIDERS" => Some(r#"[{"provider": "fxratesapi", "key": "hidden-key""#.to_string()),
            _ => None,
        });

        let err = settings.validate().unwrap_err();
        assert!(err.contains("EXCHANGE_PROVIDERS"));
        assert!(!err.contains("No exchange providers"));
        assert!(!err.contains("hidden-key"));
    }

    #[test]
    fn test_single_provider_from_lookup() {
        let settings = ProviderSettings::from_lookup(|key| match key {
            "EXCHANGE_PROVIDER" => Some("currencylayer".to_string()),
            "EXCHANGE_API_KEY" => Some("k".to_string()),
            "PROVIDER_REQUEST_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        });

        assert!(settings.validate().is_ok());
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.providers[0].key.expose(), "k");
    }
}
