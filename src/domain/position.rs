use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::signal::{Direction, OpenOrigin};

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Invalid position size: {0}")]
    InvalidSize(f64),
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),
}

/// How floating PnL is computed while a position is open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PnlModel {
    /// True mark-to-market: half the notional on each leg, valued against
    /// the leg's entry price. Default.
    LegPrices,
    /// Legacy approximation: `size * coefficient * (|entry_z| - |z|)`.
    /// Monotone in reversion distance but blind to asymmetric leg moves.
    ZScoreProxy { coefficient: f64 },
}

impl Default for PnlModel {
    fn default() -> Self {
        PnlModel::LegPrices
    }
}

/// One open paper trade for one pair. The ledger guarantees at most one of
/// these exists per pair name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pair: String,
    pub direction: Direction,
    /// Notional reserved from cash, split evenly across the two legs.
    pub size: f64,
    /// Leg quantities fixed at entry: `(size / 2) / entry_price`.
    pub qty_a: f64,
    pub qty_b: f64,
    pub entry_price_a: f64,
    pub entry_price_b: f64,
    pub entry_z: f64,
    pub entry_time: DateTime<Utc>,
    /// Cycle number at entry; holding duration is measured in cycles.
    pub entry_cycle: u64,
    pub origin: OpenOrigin,
    pub floating_pnl: f64,
    pub high_water_pnl: f64,
    pub low_water_pnl: f64,
    /// Most recent marked prices and z, used when the position is realized.
    pub last_price_a: f64,
    pub last_price_b: f64,
    pub last_z: Option<f64>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: impl Into<String>,
        direction: Direction,
        size: f64,
        entry_z: f64,
        entry_price_a: f64,
        entry_price_b: f64,
        entry_time: DateTime<Utc>,
        entry_cycle: u64,
        origin: OpenOrigin,
    ) -> Result<Self, PositionError> {
        if size <= 0.0 || !size.is_finite() {
            return Err(PositionError::InvalidSize(size));
        }
        if entry_price_a <= 0.0 || !entry_price_a.is_finite() {
            return Err(PositionError::InvalidPrice(entry_price_a));
        }
        if entry_price_b <= 0.0 || !entry_price_b.is_finite() {
            return Err(PositionError::InvalidPrice(entry_price_b));
        }

        let half = size / 2.0;
        Ok(Self {
            pair: pair.into(),
            direction,
            size,
            qty_a: half / entry_price_a,
            qty_b: half / entry_price_b,
            entry_price_a,
            entry_price_b,
            entry_z,
            entry_time,
            entry_cycle,
            origin,
            floating_pnl: 0.0,
            high_water_pnl: 0.0,
            low_water_pnl: 0.0,
            last_price_a: entry_price_a,
            last_price_b: entry_price_b,
            last_z: Some(entry_z),
        })
    }

    /// Recompute floating PnL from fresh leg prices and update watermarks.
    ///
    /// Idempotent: repeating the call with identical inputs changes nothing.
    pub fn mark(
        &mut self,
        price_a: f64,
        price_b: f64,
        z: Option<f64>,
        model: &PnlModel,
    ) -> Result<f64, PositionError> {
        if price_a <= 0.0 || !price_a.is_finite() {
            return Err(PositionError::InvalidPrice(price_a));
        }
        if price_b <= 0.0 || !price_b.is_finite() {
            return Err(PositionError::InvalidPrice(price_b));
        }

        self.floating_pnl = match model {
            PnlModel::LegPrices => self.leg_pnl(price_a, price_b),
            PnlModel::ZScoreProxy { coefficient } => match z {
                Some(z) => self.size * coefficient * (self.entry_z.abs() - z.abs()),
                // Without a z-score the proxy cannot move; keep the last value.
                None => self.floating_pnl,
            },
        };

        self.high_water_pnl = self.high_water_pnl.max(self.floating_pnl);
        self.low_water_pnl = self.low_water_pnl.min(self.floating_pnl);
        self.last_price_a = price_a;
        self.last_price_b = price_b;
        if z.is_some() {
            self.last_z = z;
        }

        Ok(self.floating_pnl)
    }

    /// Per-leg mark-to-market against entry prices.
    fn leg_pnl(&self, price_a: f64, price_b: f64) -> f64 {
        match self.direction {
            Direction::ShortALongB => {
                self.qty_a * (self.entry_price_a - price_a)
                    + self.qty_b * (price_b - self.entry_price_b)
            }
            Direction::LongAShortB => {
                self.qty_a * (price_a - self.entry_price_a)
                    + self.qty_b * (self.entry_price_b - price_b)
            }
        }
    }

    /// Whole bars this position has been held.
    pub fn bars_held(&self, current_cycle: u64) -> u64 {
        current_cycle.saturating_sub(self.entry_cycle)
    }
}
