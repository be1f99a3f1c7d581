//! Synthetic rate source.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use ratestream_common::{CurrencyPair, ExchangeRate};
use ratestream_providers::{ProviderError, ProviderFailure, ProviderResult, RateSource};

const SOURCE_NAME: &str = "random-walk";

/// Quotes every pair from an independent multiplicative random walk.
pub struct RandomWalkSource {
    rng: Mutex<StdRng>,
    rates: Mutex<HashMap<CurrencyPair, Decimal>>,
    /// Largest relative step per fetch, e.g. 0.002 for 0.2%.
    volatility: f64,
    /// Probability that a fetch fails.
    failure_rate: f64,
}

impl RandomWalkSource {
    /// Floor that keeps every walk strictly positive.
    const MIN_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

    /// Create a source. A seed makes runs reproducible.
    pub fn new(seed: Option<u64>, volatility: f64, failure_rate: f64) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            rng: Mutex::new(rng),
            rates: Mutex::new(HashMap::new()),
            volatility: volatility.abs(),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    fn next_rate(&self, pair: &CurrencyPair) -> Option<Decimal> {
        let mut rng = self.rng.lock();
        if rng.gen_bool(self.failure_rate) {
            return None;
        }

        let mut rates = self.rates.lock();
        let current = *rates
            .entry(pair.clone())
            .or_insert_with(|| Decimal::from_f64(rng.gen_range(0.5..2.0)).unwrap_or(Decimal::ONE));

        let step = if self.volatility > 0.0 {
            rng.gen_range(-self.volatility..self.volatility)
        } else {
            0.0
        };
        let factor = Decimal::from_f64(1.0 + step).unwrap_or(Decimal::ONE);
        let next = (current * factor).round_dp(6).max(Self::MIN_RATE);

        rates.insert(pair.clone(), next);
        Some(next)
    }
}

#[async_trait]
impl RateSource for RandomWalkSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_rate(&self, pair: &CurrencyPair) -> ProviderResult<ExchangeRate> {
        let failure = |cause| ProviderError::new(SOURCE_NAME, pair.clone(), cause);

        let rate = self
            .next_rate(pair)
            .ok_or_else(|| failure(ProviderFailure::Transport("simulated outage".to_string())))?;

        ExchangeRate::new(pair.clone(), rate)
            .map_err(|e| failure(ProviderFailure::Parse(e.to_string())))
    }
}
