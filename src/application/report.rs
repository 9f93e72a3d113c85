//! Cycle Reports
//!
//! Structured output of one evaluation cycle: one entry per configured
//! pair plus account-level aggregates. Consumers subscribe through the
//! reporting port; the engine itself never formats or sends anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{AccountSummary, CloseReason, Direction, Signal};
use crate::strategy::StationarityVerdict;

/// Why a pair produced no evaluation this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The feed returned no live price for one leg.
    MissingPrice { symbol: String },
    /// The feed holds fewer bars than the pipeline needs.
    InsufficientHistory {
        symbol: String,
        have: usize,
        need: usize,
    },
    /// The feed failed outright for one leg.
    FeedError { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrice { symbol } => write!(f, "no current price for {symbol}"),
            Self::InsufficientHistory { symbol, have, need } => {
                write!(f, "history too short for {symbol}: {have}/{need} bars")
            }
            Self::FeedError { message } => write!(f, "feed error: {message}"),
        }
    }
}

/// One pair's evaluation for one cycle.
///
/// A skipped pair keeps its slot in the report with `skipped` set and
/// the statistics fields empty, so a dark feed is visible rather than
/// silent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub pair: String,
    pub asset_a: String,
    pub asset_b: String,
    pub price_a: Option<f64>,
    pub price_b: Option<f64>,
    pub spread: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub z_score: Option<f64>,
    pub verdict: Option<StationarityVerdict>,
    pub signal: Signal,
    /// Set exactly when `signal` is an exit.
    pub close_reason: Option<CloseReason>,
    /// Direction of the open position after this cycle, if any.
    pub position: Option<Direction>,
    pub skipped: Option<SkipReason>,
}

impl PairReport {
    /// Report slot for a pair that could not be evaluated this cycle.
    pub fn skipped(
        pair: &crate::domain::Pair,
        reason: SkipReason,
        price_a: Option<f64>,
        price_b: Option<f64>,
        position: Option<Direction>,
    ) -> Self {
        Self {
            pair: pair.name.clone(),
            asset_a: pair.asset_a.clone(),
            asset_b: pair.asset_b.clone(),
            price_a,
            price_b,
            spread: None,
            mean: None,
            std_dev: None,
            z_score: None,
            verdict: None,
            signal: Signal::NoData,
            close_reason: None,
            position,
            skipped: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn stationary(&self) -> bool {
        self.verdict.as_ref().map(|v| v.stationary).unwrap_or(false)
    }
}

/// Aggregate view of one full evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub auto_trading: bool,
    pub pairs: Vec<PairReport>,
    pub total_pairs: usize,
    /// Pairs that produced an evaluation (not skipped).
    pub evaluated_pairs: usize,
    pub stationary_pairs: usize,
    /// Pairs whose signal calls for an entry or an exit.
    pub signal_count: usize,
    pub account: AccountSummary,
}

impl CycleReport {
    pub fn new(
        cycle: u64,
        timestamp: DateTime<Utc>,
        auto_trading: bool,
        pairs: Vec<PairReport>,
        account: AccountSummary,
    ) -> Self {
        let total_pairs = pairs.len();
        let evaluated_pairs = pairs.iter().filter(|p| !p.is_skipped()).count();
        let stationary_pairs = pairs.iter().filter(|p| p.stationary()).count();
        let signal_count = pairs.iter().filter(|p| p.signal.is_actionable()).count();

        Self {
            cycle,
            timestamp,
            auto_trading,
            pairs,
            total_pairs,
            evaluated_pairs,
            stationary_pairs,
            signal_count,
            account,
        }
    }
}
