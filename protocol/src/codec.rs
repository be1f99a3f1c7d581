//! Encoding and decoding of broker record values.

use ratestream_common::{CommonError, ExchangePackage};
use thiserror::Error;

use crate::messages::PackageMessage;

/// Wire encoding errors.
#[derive(Error, Debug)]
pub enum WireError {
    /// Payload was not valid JSON or did not have the package shape.
    #[error("Malformed package payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A rate field could not be read as a decimal.
    #[error("Invalid decimal on the wire: {0:?}")]
    InvalidDecimal(String),

    /// A rate failed model validation.
    #[error("Invalid rate in payload: {0}")]
    InvalidRate(#[from] CommonError),
}

impl WireError {
    /// Get error code for structured logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            WireError::Malformed(_) => "MALFORMED_PAYLOAD",
            WireError::InvalidDecimal(_) => "INVALID_DECIMAL",
            WireError::InvalidRate(_) => "INVALID_RATE",
        }
    }
}

/// Encode a package to its canonical JSON bytes.
pub fn encode_package(package: &ExchangePackage) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(&PackageMessage::from(package))?)
}

/// Decode a package from a broker record value.
///
/// The decoded package has no id; ids belong to the store that produced it.
pub fn decode_package(payload: &[u8]) -> Result<ExchangePackage, WireError> {
    let message: PackageMessage = serde_json::from_slice(payload)?;
    ExchangePackage::try_from(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use ratestream_common::{Currency, CurrencyPair, ExchangeRate, PackageId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sample_package() -> ExchangePackage {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        ExchangePackage::at(
            time,
            vec![
                ExchangeRate::new(
                    CurrencyPair::new(Currency::usd(), Currency::eur()),
                    dec!(0.91234567),
                )
                .unwrap(),
                ExchangeRate::new(
                    CurrencyPair::new(Currency::gbp(), Currency::jpy()),
                    dec!(189.5),
                )
                .unwrap(),
            ],
        )
    }

    #[test]
    fn test_encoded_shape() {
        let bytes = encode_package(&sample_package()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["time"], "2024-03-01T12:30:00Z");
        assert_eq!(value["rates"][0]["from"], "USD");
        assert_eq!(value["rates"][0]["to"], "EUR");
        assert_eq!(value["rates"][0]["rate"], "0.91234567");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_roundtrip_preserves_time_and_rates() {
        let package = sample_package();
        let decoded = decode_package(&encode_package(&package).unwrap()).unwrap();

        assert_eq!(decoded.time(), package.time());
        assert_eq!(decoded.rates(), package.rates());
    }

    #[test]
    fn test_id_is_not_transmitted() {
        let stored = sample_package().persisted(PackageId::new());
        let decoded = decode_package(&encode_package(&stored).unwrap()).unwrap();
        assert!(decoded.id().is_none());
    }

    #[test]
    fn test_decode_accepts_numeric_rate() {
        let payload = br#"{"time":"2024-03-01T12:30:00Z","rates":[{"from":"usd","to":"eur","rate":0.5}]}"#;
        let decoded = decode_package(payload).unwrap();
        assert_eq!(decoded.rates()[0].rate(), dec!(0.5));
        assert_eq!(decoded.rates()[0].from(), &Currency::usd());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            decode_package(b"not json"),
            Err(WireError::Malformed(_))
        ));
        assert!(matches!(
            decode_package(br#"{"rates":[]}"#),
            Err(WireError::Malformed(_))
        ));
        let zero = br#"{"time":"2024-03-01T12:30:00Z","rates":[{"from":"USD","to":"EUR","rate":"0"}]}"#;
        assert!(matches!(decode_package(zero), Err(WireError::InvalidRate(_))));
    }

    #[test]
    fn test_decode_empty_rates() {
        let decoded = decode_package(br#"{"time":"2024-03-01T12:30:00Z","rates":[]}"#).unwrap();
        assert!(decoded.is_empty());
    }

    proptest! {
        #[test]
        fn prop_rate_precision_survives(mantissa in 1i64..i64::MAX, scale in 0u32..18) {
            let rate = Decimal::new(mantissa, scale);
            let package = ExchangePackage::at(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                vec![ExchangeRate::new(CurrencyPair::new(Currency::usd(), Currency::eur()), rate).unwrap()],
            );
            let decoded = decode_package(&encode_package(&package).unwrap()).unwrap();
            prop_assert_eq!(decoded.rates()[0].rate(), rate);
            prop_assert_eq!(decoded.rates()[0].rate().scale(), rate.scale());
        }
    }
}
