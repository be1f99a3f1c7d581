//! Currency codes and currency pairs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// ISO 4217 style currency code.
///
/// Codes are trimmed and upper-cased on construction and must be non-empty
/// ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: &str) -> Result<Self, CommonError> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CommonError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn gbp() -> Self {
        Self("GBP".to_string())
    }

    pub fn jpy() -> Self {
        Self("JPY".to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// An ordered pair of currencies: one unit of `from` is worth `rate` units of `to`.
/// Identity is the code pair; the value is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    from: Currency,
    to: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }

    /// Build a pair from raw codes.
    pub fn from_codes(from: &str, to: &str) -> Result<Self, CommonError> {
        Ok(Self::new(Currency::new(from)?, Currency::new(to)?))
    }

    /// Source currency.
    pub fn from(&self) -> &Currency {
        &self.from
    }

    /// Target currency.
    pub fn to(&self) -> &Currency {
        &self.to
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// Parses `USD:EUR`, `USD/EUR` or `USD-EUR`.
impl FromStr for CurrencyPair {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(|c: char| matches!(c, ':' | '/' | '-'))
            .ok_or_else(|| CommonError::InvalidCurrency(s.trim().to_string()))?;
        Self::from_codes(from, to)
    }
}

/// Parse a comma separated list of pairs, e.g. `USD:EUR,GBP:JPY`.
pub fn parse_pair_list(s: &str) -> Result<Vec<CurrencyPair>, CommonError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(CurrencyPair::from_str)
        .collect()
}
