//! Exchange rates and the timestamped packages that carry them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CommonError, Currency, CurrencyPair, PackageId};

/// A single quoted rate: one unit of `from` buys `rate` units of `to`.
///
/// The rate is a fixed-precision decimal and is always strictly positive.
/// Values are produced once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawExchangeRate")]
pub struct ExchangeRate {
    from: Currency,
    to: Currency,
    rate: Decimal,
}

impl ExchangeRate {
    /// Create a new exchange rate.
    pub fn new(pair: CurrencyPair, rate: Decimal) -> Result<Self, CommonError> {
        if rate <= Decimal::ZERO {
            return Err(CommonError::NonPositiveRate {
                from: pair.from().to_string(),
                to: pair.to().to_string(),
                rate: rate.to_string(),
            });
        }
        Ok(Self {
            from: pair.from().clone(),
            to: pair.to().clone(),
            rate,
        })
    }

    /// Source currency.
    pub fn from(&self) -> &Currency {
        &self.from
    }

    /// Target currency.
    pub fn to(&self) -> &Currency {
        &self.to
    }

    /// The quoted rate.
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// The pair this rate quotes.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.from.clone(), self.to.clone())
    }

    /// Check whether this rate quotes the given pair.
    pub fn quotes(&self, pair: &CurrencyPair) -> bool {
        &self.from == pair.from() && &self.to == pair.to()
    }
}

/// Unvalidated shape used only during deserialization.
#[derive(Deserialize)]
struct RawExchangeRate {
    from: Currency,
    to: Currency,
    rate: Decimal,
}

impl TryFrom<RawExchangeRate> for ExchangeRate {
    type Error = CommonError;

    fn try_from(raw: RawExchangeRate) -> Result<Self, Self::Error> {
        ExchangeRate::new(CurrencyPair::new(raw.from, raw.to), raw.rate)
    }
}

/// A timestamped batch of rates fetched together.
///
/// `time` is fixed when the package is assembled. `id` stays empty until the
/// store persists the package and hands back the stored copy. Rates are kept
/// in the order fetches completed, not the order they were requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePackage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<PackageId>,
    time: DateTime<Utc>,
    rates: Vec<ExchangeRate>,
}

impl ExchangePackage {
    /// Assemble a package stamped with the current UTC time.
    pub fn assemble(rates: Vec<ExchangeRate>) -> Self {
        Self::at(Utc::now(), rates)
    }

    /// Assemble a package with an explicit timestamp.
    pub fn at(time: DateTime<Utc>, rates: Vec<ExchangeRate>) -> Self {
        Self {
            id: None,
            time,
            rates,
        }
    }

    /// Return the stored copy of this package under the given id.
    /// Only stores call this.
    pub fn persisted(self, id: PackageId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    /// Store-assigned id, if persisted.
    pub fn id(&self) -> Option<PackageId> {
        self.id
    }

    /// When the package was assembled.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Rates in completion order.
    pub fn rates(&self) -> &[ExchangeRate] {
        &self.rates
    }

    /// Number of rates carried.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if every fetch in the batch failed.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Find the rate quoted for a pair.
    pub fn rate_for(&self, pair: &CurrencyPair) -> Option<&ExchangeRate> {
        self.rates.iter().find(|r| r.quotes(pair))
    }

    /// Check if the package carries a rate for a pair.
    pub fn contains_pair(&self, pair: &CurrencyPair) -> bool {
        self.rate_for(pair).is_some()
    }
}
