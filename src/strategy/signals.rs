//! Signal State Machine
//!
//! Combines the current z-score, the stationarity verdict, and the open
//! position (if any) into exactly one signal per pair per cycle.
//!
//! Priority order:
//! 1. Risk overrides on an open position (stop-loss, then max-hold)
//! 2. No data (z-score undefined this cycle)
//! 3. Gate block on a flat pair (no entries into non-stationary spreads)
//! 4. Entries on a flat pair (z beyond the entry band)
//! 5. Signal exit on an open position (z back inside the exit band)
//! 6. Hold
//!
//! Risk overrides outrank everything so a position is never kept open by
//! a friendly z-score while it bleeds past its loss or its holding limit.

use crate::domain::{CloseReason, Signal};
use crate::strategy::params::{RiskParams, SignalParams};

/// The slice of an open position the state machine needs.
#[derive(Debug, Clone, Copy)]
pub struct OpenState {
    pub floating_pnl: f64,
    pub size: f64,
    pub bars_held: u64,
}

/// One evaluation outcome. `close_reason` is set exactly when the signal
/// is an exit, distinguishing risk-forced exits from signal exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalDecision {
    pub signal: Signal,
    pub close_reason: Option<CloseReason>,
}

impl SignalDecision {
    fn plain(signal: Signal) -> Self {
        Self {
            signal,
            close_reason: None,
        }
    }

    fn exit(reason: CloseReason) -> Self {
        Self {
            signal: Signal::Exit,
            close_reason: Some(reason),
        }
    }
}

/// Per-pair signal evaluation. Stateless: position state travels in as
/// `OpenState`, so the engine is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    signals: SignalParams,
    risk: RiskParams,
}

impl SignalEngine {
    pub fn new(signals: SignalParams, risk: RiskParams) -> Self {
        Self { signals, risk }
    }

    /// Evaluate one pair for one cycle.
    ///
    /// `z` is `None` when the rolling window could not produce a score;
    /// risk overrides still fire in that case, everything else is
    /// answered with `NoData`.
    pub fn evaluate(
        &self,
        z: Option<f64>,
        stationary: bool,
        open: Option<OpenState>,
    ) -> SignalDecision {
        if let Some(state) = open {
            if state.floating_pnl <= -(self.risk.stop_loss_fraction * state.size) {
                return SignalDecision::exit(CloseReason::StopLoss);
            }
            if state.bars_held >= self.risk.max_hold_bars {
                return SignalDecision::exit(CloseReason::MaxHold);
            }
        }

        let z = match z {
            Some(value) => value,
            None => return SignalDecision::plain(Signal::NoData),
        };

        match open {
            None => {
                if !stationary {
                    return SignalDecision::plain(Signal::NotStationary);
                }
                if z > self.signals.entry_z {
                    return SignalDecision::plain(Signal::EnterShortALongB);
                }
                if z < -self.signals.entry_z {
                    return SignalDecision::plain(Signal::EnterLongAShortB);
                }
                SignalDecision::plain(Signal::Hold)
            }
            Some(_) => {
                if z.abs() < self.signals.exit_z {
                    return SignalDecision::exit(CloseReason::SignalExit);
                }
                SignalDecision::plain(Signal::Hold)
            }
        }
    }
}
