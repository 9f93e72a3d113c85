//! Synthetic Market Data
//!
//! Generates a cointegrated symbol universe for demo runs and backtests
//! without a data directory. All symbols ride one shared geometric
//! Brownian motion factor; each symbol additionally carries its own
//! mean-reverting Ornstein-Uhlenbeck log offset:
//!
//!   price_i(t) = base_i * gbm(t) * exp(ou_i(t))
//!
//! The common factor cancels out of every pair ratio, so the ratio of any
//! two generated symbols is stationary by construction while the prices
//! themselves trend. Output is deterministic under a fixed seed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;
use thiserror::Error;
use tracing::info;

use crate::adapters::replay::ReplayFeed;
use crate::domain::{PricePoint, PriceSeries, SeriesError};

/// Bar spacing for generated series.
const BAR_SECONDS: i64 = 3_600;
/// Timestamp of the first generated bar.
const SERIES_EPOCH: i64 = 1_700_000_000;

#[derive(Debug, Error)]
pub enum SyntheticError {
    #[error("Invalid generator parameter: {0}")]
    InvalidParameter(String),
    #[error("Series construction failed: {0}")]
    Series(#[from] SeriesError),
}

/// Generator settings. Defaults produce a universe that passes the
/// stationarity gate on every pair with room to spare.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub bars: usize,
    pub seed: u64,
    /// Price level of the first symbol; each later symbol halves it.
    pub anchor_price: f64,
    /// GBM drift per bar for the shared market factor.
    pub drift: f64,
    /// GBM volatility per bar for the shared market factor.
    pub volatility: f64,
    /// Per-bar pull of each symbol's log offset toward zero, in (0, 1].
    pub reversion: f64,
    /// Per-bar volatility of each symbol's log offset.
    pub offset_volatility: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bars: 600,
            seed: 7,
            anchor_price: 100.0,
            drift: 0.0002,
            volatility: 0.01,
            reversion: 0.2,
            offset_volatility: 0.02,
        }
    }
}

impl SyntheticConfig {
    pub fn with_bars(mut self, bars: usize) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<(), SyntheticError> {
        if self.bars == 0 {
            return Err(SyntheticError::InvalidParameter(
                "bars must be positive".to_string(),
            ));
        }
        if !(self.anchor_price.is_finite() && self.anchor_price > 0.0) {
            return Err(SyntheticError::InvalidParameter(format!(
                "anchor price must be positive, got {}",
                self.anchor_price
            )));
        }
        if !(self.reversion > 0.0 && self.reversion <= 1.0) {
            return Err(SyntheticError::InvalidParameter(format!(
                "reversion must be in (0, 1], got {}",
                self.reversion
            )));
        }
        for (name, value) in [
            ("drift", self.drift),
            ("volatility", self.volatility),
            ("offset volatility", self.offset_volatility),
        ] {
            if !value.is_finite() || (name != "drift" && value < 0.0) {
                return Err(SyntheticError::InvalidParameter(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Generate one series per symbol.
pub fn generate(
    symbols: &[String],
    config: &SyntheticConfig,
) -> Result<HashMap<String, PriceSeries>, SyntheticError> {
    config.validate()?;
    let unit = Normal::new(0.0, 1.0)
        .map_err(|e| SyntheticError::InvalidParameter(e.to_string()))?;
    let start = DateTime::<Utc>::from_timestamp(SERIES_EPOCH, 0).ok_or_else(|| {
        SyntheticError::InvalidParameter("series epoch out of range".to_string())
    })?;

    // Shared market factor, common to all symbols.
    let mut factor = Vec::with_capacity(config.bars);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut level = 1.0_f64;
    let drift_term = config.drift - 0.5 * config.volatility * config.volatility;
    for _ in 0..config.bars {
        level *= (drift_term + config.volatility * unit.sample(&mut rng)).exp();
        factor.push(level);
    }

    let mut series = HashMap::with_capacity(symbols.len());
    for (index, symbol) in symbols.iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1 + index as u64));
        let base = config.anchor_price / 2_f64.powi(index as i32);

        let mut one = PriceSeries::new();
        let mut offset = 0.0_f64;
        for (t, market) in factor.iter().enumerate() {
            offset += config.reversion * (0.0 - offset)
                + config.offset_volatility * unit.sample(&mut rng);
            let close = base * market * offset.exp();
            let timestamp = start + Duration::seconds(BAR_SECONDS * t as i64);
            one.push(PricePoint::new(timestamp, close))?;
        }
        series.insert(symbol.clone(), one);
    }

    info!(
        symbols = symbols.len(),
        bars = config.bars,
        seed = config.seed,
        "synthetic data generated"
    );
    Ok(series)
}

/// Generate and wrap in a replay feed, ready to drive the loop.
pub fn feed(
    symbols: &[String],
    config: &SyntheticConfig,
) -> Result<ReplayFeed, SyntheticError> {
    Ok(ReplayFeed::from_series(generate(symbols, config)?))
}
