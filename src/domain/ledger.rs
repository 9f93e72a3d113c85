//! Position & Risk Ledger
//!
//! Exclusive owner of the paper account: cash, the set of open positions
//! (at most one per pair, enforced here), the append-only trade history, and
//! the realized performance statistics. Every mutation is one atomic step
//! from the caller's point of view; nothing else in the crate touches this
//! state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::position::{PnlModel, Position, PositionError};
use super::signal::{CloseReason, Direction, OpenOrigin};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Pair {0} already has an open position")]
    PositionExists(String),
    #[error("No open position for pair {0}")]
    NoPosition(String),
    #[error("Insufficient cash: need {needed:.2}, available {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },
    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Entry appended to history when a position is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRecord {
    pub pair: String,
    pub direction: Direction,
    pub origin: OpenOrigin,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_z: f64,
    pub entry_price_a: f64,
    pub entry_price_b: f64,
}

/// Entry appended to history when a position is realized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub pair: String,
    pub direction: Direction,
    pub origin: OpenOrigin,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub bars_held: u64,
    pub entry_z: f64,
    pub exit_z: Option<f64>,
    pub entry_price_a: f64,
    pub entry_price_b: f64,
    pub exit_price_a: f64,
    pub exit_price_b: f64,
    pub realized_pnl: f64,
    pub reason: CloseReason,
}

/// Append-only history entry, also pushed to report sinks as the per-trade
/// event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TradeEvent {
    Opened(OpenRecord),
    Closed(ClosedTrade),
}

/// Realized performance counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub closed_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub realized_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub sum_wins: f64,
    pub sum_losses: f64,
}

impl LedgerStats {
    /// Fraction of closed trades with positive PnL; 0.0 before any close.
    pub fn win_rate(&self) -> f64 {
        if self.closed_trades == 0 {
            return 0.0;
        }
        self.winning_trades as f64 / self.closed_trades as f64
    }

    pub fn avg_win(&self) -> f64 {
        if self.winning_trades == 0 {
            return 0.0;
        }
        self.sum_wins / self.winning_trades as f64
    }

    pub fn avg_loss(&self) -> f64 {
        if self.losing_trades == 0 {
            return 0.0;
        }
        self.sum_losses / self.losing_trades as f64
    }

    fn record_close(&mut self, pnl: f64) {
        self.closed_trades += 1;
        self.realized_pnl += pnl;

        if pnl > 0.0 {
            self.winning_trades += 1;
            self.sum_wins += pnl;
            if pnl > self.largest_win {
                self.largest_win = pnl;
            }
        } else if pnl < 0.0 {
            self.losing_trades += 1;
            self.sum_losses += pnl.abs();
            if pnl.abs() > self.largest_loss {
                self.largest_loss = pnl.abs();
            }
        }
    }
}

/// Point-in-time account snapshot for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub cash: f64,
    pub exposure: f64,
    pub floating_pnl: f64,
    pub realized_pnl: f64,
    pub equity: f64,
    pub peak_equity: f64,
    pub drawdown: f64,
    pub max_drawdown: f64,
    pub open_positions: usize,
    pub closed_trades: u32,
    pub win_rate: f64,
}

/// The paper account and its open positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    starting_balance: f64,
    cash: f64,
    pnl_model: PnlModel,
    positions: HashMap<String, Position>,
    history: Vec<TradeEvent>,
    stats: LedgerStats,
    peak_equity: f64,
    max_drawdown: f64,
}

impl Ledger {
    pub fn new(starting_balance: f64, pnl_model: PnlModel) -> Self {
        Self {
            starting_balance,
            cash: starting_balance,
            pnl_model,
            positions: HashMap::new(),
            history: Vec::new(),
            stats: LedgerStats::default(),
            peak_equity: starting_balance,
            max_drawdown: 0.0,
        }
    }

    /// Open a position for `pair`. Fails without touching any state if a
    /// position already exists or cash cannot cover the notional.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        pair: &str,
        direction: Direction,
        size: f64,
        entry_z: f64,
        price_a: f64,
        price_b: f64,
        entry_time: DateTime<Utc>,
        cycle: u64,
        origin: OpenOrigin,
    ) -> Result<OpenRecord, LedgerError> {
        if self.positions.contains_key(pair) {
            warn!(pair, "open rejected: position already exists");
            return Err(LedgerError::PositionExists(pair.to_string()));
        }
        if size > self.cash {
            warn!(
                pair,
                size, cash = self.cash,
                "open rejected: insufficient cash"
            );
            return Err(LedgerError::InsufficientCash {
                needed: size,
                available: self.cash,
            });
        }

        let position = Position::new(
            pair, direction, size, entry_z, price_a, price_b, entry_time, cycle, origin,
        )?;

        let record = OpenRecord {
            pair: pair.to_string(),
            direction,
            origin,
            size,
            entry_time,
            entry_z,
            entry_price_a: price_a,
            entry_price_b: price_b,
        };

        self.cash -= size;
        self.positions.insert(pair.to_string(), position);
        self.history.push(TradeEvent::Opened(record.clone()));
        self.update_peak();

        info!(pair, %direction, size, entry_z, "position opened");
        Ok(record)
    }

    /// Refresh floating PnL and watermarks for `pair` from current leg
    /// prices. Idempotent for identical inputs. Returns the floating PnL.
    pub fn mark_to_market(
        &mut self,
        pair: &str,
        price_a: f64,
        price_b: f64,
        z: Option<f64>,
    ) -> Result<f64, LedgerError> {
        let model = self.pnl_model;
        let position = self
            .positions
            .get_mut(pair)
            .ok_or_else(|| LedgerError::NoPosition(pair.to_string()))?;
        let pnl = position.mark(price_a, price_b, z, &model)?;
        self.update_peak();
        Ok(pnl)
    }

    /// Realize the open position for `pair` at its last marked value.
    pub fn close(
        &mut self,
        pair: &str,
        reason: CloseReason,
        exit_time: DateTime<Utc>,
        cycle: u64,
    ) -> Result<ClosedTrade, LedgerError> {
        let position = self
            .positions
            .remove(pair)
            .ok_or_else(|| {
                warn!(pair, "close rejected: no open position");
                LedgerError::NoPosition(pair.to_string())
            })?;

        let realized = position.floating_pnl;
        self.cash += position.size + realized;

        let trade = ClosedTrade {
            pair: position.pair.clone(),
            direction: position.direction,
            origin: position.origin,
            size: position.size,
            entry_time: position.entry_time,
            exit_time,
            bars_held: position.bars_held(cycle),
            entry_z: position.entry_z,
            exit_z: position.last_z,
            entry_price_a: position.entry_price_a,
            entry_price_b: position.entry_price_b,
            exit_price_a: position.last_price_a,
            exit_price_b: position.last_price_b,
            realized_pnl: realized,
            reason,
        };

        self.stats.record_close(realized);
        self.history.push(TradeEvent::Closed(trade.clone()));
        self.update_peak();

        info!(
            pair,
            %reason,
            pnl = realized,
            bars_held = trade.bars_held,
            "position closed"
        );
        Ok(trade)
    }

    /// Close every open position. Safe on an empty book; the closed count is
    /// the length of the returned records.
    pub fn close_all(
        &mut self,
        reason: CloseReason,
        exit_time: DateTime<Utc>,
        cycle: u64,
    ) -> Vec<ClosedTrade> {
        let mut pairs: Vec<String> = self.positions.keys().cloned().collect();
        pairs.sort();

        let mut closed = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match self.close(&pair, reason, exit_time, cycle) {
                Ok(trade) => closed.push(trade),
                // Unreachable with exclusive ownership; keep the book sane.
                Err(e) => warn!(pair = pair.as_str(), error = %e, "close_all skip"),
            }
        }
        closed
    }

    pub fn position(&self, pair: &str) -> Option<&Position> {
        self.positions.get(pair)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn history(&self) -> &[TradeEvent] {
        &self.history
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    pub fn pnl_model(&self) -> PnlModel {
        self.pnl_model
    }

    pub fn starting_balance(&self) -> f64 {
        self.starting_balance
    }

    /// Cash not reserved by open positions.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Sum of open position notionals.
    pub fn exposure(&self) -> f64 {
        self.positions.values().map(|p| p.size).sum()
    }

    /// Sum of open positions' floating PnL.
    pub fn floating_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.floating_pnl).sum()
    }

    /// Account value: free cash plus reserved notionals plus floating PnL.
    pub fn equity(&self) -> f64 {
        self.cash + self.exposure() + self.floating_pnl()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.stats.realized_pnl
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    /// Current drawdown from peak equity, as a fraction.
    pub fn drawdown(&self) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        ((self.peak_equity - self.equity()) / self.peak_equity).max(0.0)
    }

    /// Worst drawdown observed over the ledger's lifetime.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn win_rate(&self) -> f64 {
        self.stats.win_rate()
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            cash: self.cash,
            exposure: self.exposure(),
            floating_pnl: self.floating_pnl(),
            realized_pnl: self.stats.realized_pnl,
            equity: self.equity(),
            peak_equity: self.peak_equity,
            drawdown: self.drawdown(),
            max_drawdown: self.max_drawdown,
            open_positions: self.positions.len(),
            closed_trades: self.stats.closed_trades,
            win_rate: self.stats.win_rate(),
        }
    }

    fn update_peak(&mut self) {
        let equity = self.equity();
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let drawdown = self.drawdown();
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }
}
