//! Wire message types.
//!
//! A package travels as `{ "time": ISO-8601 UTC, "rates": [ { "from", "to", "rate" } ] }`.
//! The store-assigned id never goes on the wire.

use chrono::{DateTime, Utc};
use ratestream_common::{CurrencyPair, ExchangePackage, ExchangeRate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::codec::WireError;

/// Package as carried in a broker record value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMessage {
    /// Assembly time.
    pub time: DateTime<Utc>,
    /// Rates in completion order.
    pub rates: Vec<RateMessage>,
}

/// A single rate on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateMessage {
    /// Source currency code.
    pub from: String,
    /// Target currency code.
    pub to: String,
    /// Rate value.
    pub rate: WireDecimal,
}

/// Decimal as it appears on the wire.
///
/// Written as a JSON string so no precision is lost. Readers also accept a
/// bare JSON number for payloads from other writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireDecimal {
    Text(String),
    Number(serde_json::Number),
}

impl WireDecimal {
    /// Parse into a decimal.
    pub fn to_decimal(&self) -> Result<Decimal, WireError> {
        let text = match self {
            WireDecimal::Text(s) => s.trim().to_string(),
            WireDecimal::Number(n) => n.to_string(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|_| WireError::InvalidDecimal(text))
    }
}

impl From<Decimal> for WireDecimal {
    fn from(value: Decimal) -> Self {
        WireDecimal::Text(value.to_string())
    }
}

impl From<&ExchangePackage> for PackageMessage {
    fn from(package: &ExchangePackage) -> Self {
        Self {
            time: package.time(),
            rates: package
                .rates()
                .iter()
                .map(|rate| RateMessage {
                    from: rate.from().code().to_string(),
                    to: rate.to().code().to_string(),
                    rate: rate.rate().into(),
                })
                .collect(),
        }
    }
}

impl TryFrom<PackageMessage> for ExchangePackage {
    type Error = WireError;

    fn try_from(message: PackageMessage) -> Result<Self, Self::Error> {
        let rates = message
            .rates
            .into_iter()
            .map(|rate| {
                let pair = CurrencyPair::from_codes(&rate.from, &rate.to)?;
                Ok(ExchangeRate::new(pair, rate.rate.to_decimal()?)?)
            })
            .collect::<Result<Vec<_>, WireError>>()?;
        Ok(ExchangePackage::at(message.time, rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wire_decimal_accepts_text_and_number() {
        let text: WireDecimal = serde_json::from_str("\"0.91234567\"").unwrap();
        assert_eq!(text.to_decimal().unwrap(), dec!(0.91234567));

        let number: WireDecimal = serde_json::from_str("1.25").unwrap();
        assert_eq!(number.to_decimal().unwrap(), dec!(1.25));

        let integer: WireDecimal = serde_json::from_str("110").unwrap();
        assert_eq!(integer.to_decimal().unwrap(), dec!(110));
    }

    #[test]
    fn test_wire_decimal_rejects_garbage() {
        let bad = WireDecimal::Text("abc".to_string());
        assert!(matches!(bad.to_decimal(), Err(WireError::InvalidDecimal(_))));
    }

    #[test]
    fn test_decimal_written_as_string() {
        let value: WireDecimal = dec!(0.9200).into();
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"0.9200\"");
    }
}
