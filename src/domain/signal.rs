//! Trading Signals
//!
//! One signal is emitted per pair per cycle, a pure function of the current
//! z-score, the stationarity verdict, and whether a position is open. The
//! variants are typed end to end; display strings exist for humans and logs
//! and are never parsed back.

use serde::{Deserialize, Serialize};

use super::pair::Pair;

/// Which leg is short and which is long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Spread above its mean: short leg a, long leg b, expect reversion down.
    ShortALongB,
    /// Spread below its mean: long leg a, short leg b, expect reversion up.
    LongAShortB,
}

impl Direction {
    /// `(short leg, long leg)` symbols for a given pair.
    pub fn legs<'a>(&self, pair: &'a Pair) -> (&'a str, &'a str) {
        match self {
            Direction::ShortALongB => (&pair.asset_a, &pair.asset_b),
            Direction::LongAShortB => (&pair.asset_b, &pair.asset_a),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ShortALongB => write!(f, "short_a_long_b"),
            Direction::LongAShortB => write!(f, "long_a_short_b"),
        }
    }
}

/// Per-pair per-cycle decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Z-score undefined: short history, flat window, or missing prices.
    NoData,
    /// Stationarity gate failed; entries are not permitted.
    NotStationary,
    /// No state change.
    Hold,
    /// Spread rich: enter short `asset_a` / long `asset_b`.
    EnterShortALongB,
    /// Spread cheap: enter long `asset_a` / short `asset_b`.
    EnterLongAShortB,
    /// Leave the open position.
    Exit,
}

impl Signal {
    /// Entry direction, when this signal opens a position.
    pub fn entry_direction(&self) -> Option<Direction> {
        match self {
            Signal::EnterShortALongB => Some(Direction::ShortALongB),
            Signal::EnterLongAShortB => Some(Direction::LongAShortB),
            _ => None,
        }
    }

    pub fn is_entry(&self) -> bool {
        self.entry_direction().is_some()
    }

    /// Entry or exit: a signal the ledger acts on.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Signal::EnterShortALongB | Signal::EnterLongAShortB | Signal::Exit
        )
    }

    /// Human-readable form with the pair's leg symbols filled in.
    pub fn describe(&self, pair: &Pair) -> String {
        match self.entry_direction() {
            Some(direction) => {
                let (short, long) = direction.legs(pair);
                format!("enter short {short} / long {long}")
            }
            None => self.to_string(),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Signal::NoData => "no_data",
            Signal::NotStationary => "not_stationary",
            Signal::Hold => "hold",
            Signal::EnterShortALongB => "enter_short_a_long_b",
            Signal::EnterLongAShortB => "enter_long_a_short_b",
            Signal::Exit => "exit",
        };
        write!(f, "{label}")
    }
}

/// Why a position was closed. Risk overrides are distinguishable from
/// ordinary signal exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Spread reverted inside the exit threshold.
    SignalExit,
    /// Floating loss breached the stop-loss fraction of notional.
    StopLoss,
    /// Held for the maximum allowed number of bars.
    MaxHold,
    /// Operator request.
    Manual,
    /// Engine shutting down with close-on-shutdown enabled.
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CloseReason::SignalExit => "signal_exit",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::MaxHold => "max_hold",
            CloseReason::Manual => "manual",
            CloseReason::Shutdown => "shutdown",
        };
        write!(f, "{label}")
    }
}

/// How a position came to be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenOrigin {
    Signal,
    Manual,
}
