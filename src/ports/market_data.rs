use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::PriceSeries;

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Market data unavailable: {0}")]
    Unavailable(String),

    #[error("Insufficient history for {symbol}: have {have} bars, need {need}")]
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("Feed error: {0}")]
    Feed(String),
}

/// Market data port trait
///
/// One consistent snapshot per cycle: the coordinator calls
/// `current_prices` once and `price_history` once per unique symbol,
/// and the feed must answer both from the same point in time.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Ordered close-price history for one symbol.
    ///
    /// Must hold at least `min_bars` samples or fail with
    /// [`MarketDataError::InsufficientHistory`]. History never includes
    /// the live bar returned by `current_prices`.
    async fn price_history(
        &self,
        symbol: &str,
        min_bars: usize,
    ) -> Result<PriceSeries, MarketDataError>;

    /// Last price per requested symbol.
    ///
    /// A symbol with no price this cycle is omitted from the map, never
    /// filled with a default.
    async fn current_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, MarketDataError>;

    /// Move the feed to the next bar.
    ///
    /// Live feeds always have a next bar. Replay feeds return `false`
    /// once the recorded data is exhausted, which ends the run loop.
    async fn advance(&self) -> bool {
        true
    }
}
