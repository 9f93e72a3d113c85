//! Hand-rolled test doubles for the ports.
//!
//! Compiled into the library so integration tests can drive the engine
//! without a live feed.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::application::CycleReport;
use crate::domain::{PricePoint, PriceSeries, TradeEvent};
use crate::ports::market_data::{MarketDataError, MarketDataPort};
use crate::ports::reporting::ReportSink;

/// Fixed base timestamp for generated fixture bars.
const FIXTURE_EPOCH: i64 = 1_700_000_000;

/// Scripted market data feed.
///
/// Histories are fixed at construction; live prices can be rewritten
/// between cycles with [`set_price`](FixtureMarketData::set_price) to
/// script multi-cycle scenarios. An optional advance budget bounds the
/// run loop in tests.
#[derive(Debug, Default)]
pub struct FixtureMarketData {
    histories: HashMap<String, Vec<f64>>,
    prices: Mutex<HashMap<String, f64>>,
    advance_budget: Mutex<Option<u64>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to seed the close-price history for a symbol.
    pub fn with_history(mut self, symbol: &str, closes: Vec<f64>) -> Self {
        self.histories.insert(symbol.to_string(), closes);
        self
    }

    /// Builder method to seed the live price for a symbol.
    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
        self
    }

    /// Builder method to let `advance` succeed only `cycles` times.
    pub fn with_advance_budget(self, cycles: u64) -> Self {
        *self.advance_budget.lock().unwrap() = Some(cycles);
        self
    }

    /// Rewrite the live price for a symbol.
    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    /// Drop the live price for a symbol, making it unavailable.
    pub fn remove_price(&self, symbol: &str) {
        self.prices.lock().unwrap().remove(symbol);
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn series_from(closes: &[f64]) -> PriceSeries {
        let base = DateTime::<Utc>::from_timestamp(FIXTURE_EPOCH, 0)
            .expect("fixture epoch is valid");
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint::new(base + Duration::hours(i as i64), close))
            .collect();
        PriceSeries::from_points(points).expect("fixture bars are ordered")
    }
}

#[async_trait]
impl MarketDataPort for FixtureMarketData {
    async fn price_history(
        &self,
        symbol: &str,
        min_bars: usize,
    ) -> Result<PriceSeries, MarketDataError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("price_history({symbol})"));

        let closes = self
            .histories
            .get(symbol)
            .ok_or_else(|| MarketDataError::Unavailable(symbol.to_string()))?;
        if closes.len() < min_bars {
            return Err(MarketDataError::InsufficientHistory {
                symbol: symbol.to_string(),
                have: closes.len(),
                need: min_bars,
            });
        }
        Ok(Self::series_from(closes))
    }

    async fn current_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, MarketDataError> {
        self.calls.lock().unwrap().push("current_prices".to_string());

        let prices = self.prices.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|&p| (s.clone(), p)))
            .collect())
    }

    async fn advance(&self) -> bool {
        let mut budget = self.advance_budget.lock().unwrap();
        match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

/// Report sink that records everything it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<CycleReport>>,
    events: Mutex<Vec<TradeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CycleReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.reports.lock().unwrap().last().cloned()
    }

    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ReportSink for RecordingSink {
    fn cycle_report(&self, report: &CycleReport) {
        self.reports.lock().unwrap().push(report.clone());
    }

    fn trade_event(&self, event: &TradeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
