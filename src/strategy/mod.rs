//! Strategy Layer - Mean Reversion over Pair Spreads
//!
//! The per-pair evaluation pipeline, in order:
//! - Rolling z-score of the live spread against its trailing window
//! - Multi-window ADF stationarity gate (all sub-windows must pass)
//! - Signal state machine with risk overrides (stop-loss, max-hold)
//!
//! Every stage is a pure function of its inputs; position state and
//! account balances live in the ledger, not here.

pub mod params;
pub mod rolling;
pub mod signals;
pub mod stationarity;

pub use params::{GateParams, ParamsError, RiskParams, SignalParams, SpreadParams, StrategyParams};
pub use rolling::{zscore, RollingSnapshot};
pub use signals::{OpenState, SignalDecision, SignalEngine};
pub use stationarity::{
    adf_statistic, AdfOutcome, StatError, StationarityGate, StationarityVerdict, WindowStat,
};
