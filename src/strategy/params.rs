//! Strategy Parameters
//!
//! Parameter sets for the evaluation pipeline, each with defaults matching
//! the production tuning and a `validate()` that runs once at startup.
//! Invalid configuration is fatal; it is never silently corrected.

use serde::{Deserialize, Serialize};

use crate::domain::SpreadTransform;

/// Rolling spread statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadParams {
    /// Bars in the rolling window behind the live value.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Ratio or log-ratio, fixed for the process lifetime.
    #[serde(default)]
    pub transform: SpreadTransform,
}

fn default_window() -> usize {
    35
}

impl Default for SpreadParams {
    fn default() -> Self {
        Self {
            window: default_window(),
            transform: SpreadTransform::default(),
        }
    }
}

impl SpreadParams {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_transform(mut self, transform: SpreadTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.window < 10 {
            return Err(ParamsError::InvalidWindow(self.window));
        }
        Ok(())
    }
}

/// Entry/exit z-score thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalParams {
    #[serde(default = "default_entry_z")]
    pub entry_z: f64,
    #[serde(default = "default_exit_z")]
    pub exit_z: f64,
}

fn default_entry_z() -> f64 {
    1.0
}

fn default_exit_z() -> f64 {
    0.5
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            entry_z: default_entry_z(),
            exit_z: default_exit_z(),
        }
    }
}

impl SignalParams {
    pub fn with_entry_z(mut self, entry_z: f64) -> Self {
        self.entry_z = entry_z;
        self
    }

    pub fn with_exit_z(mut self, exit_z: f64) -> Self {
        self.exit_z = exit_z;
        self
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.exit_z < 0.0 || !self.exit_z.is_finite() {
            return Err(ParamsError::InvalidExit(self.exit_z));
        }
        if !self.entry_z.is_finite() || self.entry_z <= self.exit_z {
            return Err(ParamsError::InvalidThresholds {
                entry: self.entry_z,
                exit: self.exit_z,
            });
        }
        Ok(())
    }
}

/// Risk overrides and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    /// Force-close when floating PnL <= -(fraction * notional).
    #[serde(default = "default_stop_loss_fraction")]
    pub stop_loss_fraction: f64,
    /// Force-close after this many bars in position.
    #[serde(default = "default_max_hold_bars")]
    pub max_hold_bars: u64,
    /// Notional reserved per position.
    #[serde(default = "default_position_size")]
    pub position_size: f64,
}

fn default_stop_loss_fraction() -> f64 {
    0.10
}

fn default_max_hold_bars() -> u64 {
    30
}

fn default_position_size() -> f64 {
    1000.0
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            stop_loss_fraction: default_stop_loss_fraction(),
            max_hold_bars: default_max_hold_bars(),
            position_size: default_position_size(),
        }
    }
}

impl RiskParams {
    pub fn with_stop_loss_fraction(mut self, fraction: f64) -> Self {
        self.stop_loss_fraction = fraction;
        self
    }

    pub fn with_max_hold_bars(mut self, bars: u64) -> Self {
        self.max_hold_bars = bars;
        self
    }

    pub fn with_position_size(mut self, size: f64) -> Self {
        self.position_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.stop_loss_fraction <= 0.0 || self.stop_loss_fraction > 1.0 {
            return Err(ParamsError::InvalidStopLoss(self.stop_loss_fraction));
        }
        if self.max_hold_bars == 0 {
            return Err(ParamsError::InvalidMaxHold(self.max_hold_bars));
        }
        if self.position_size <= 0.0 || !self.position_size.is_finite() {
            return Err(ParamsError::InvalidPositionSize(self.position_size));
        }
        Ok(())
    }
}

/// Stationarity gate tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateParams {
    /// Trailing sub-windows tested independently; every one must pass.
    #[serde(default = "default_lookbacks")]
    pub lookbacks: Vec<usize>,
    /// Lagged difference terms in the test regression.
    #[serde(default = "default_lag")]
    pub lag: usize,
    /// Pass when the test statistic is at or below this value.
    #[serde(default = "default_critical_value")]
    pub critical_value: f64,
}

fn default_lookbacks() -> Vec<usize> {
    vec![120, 90, 60]
}

fn default_lag() -> usize {
    1
}

fn default_critical_value() -> f64 {
    -2.58
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            lookbacks: default_lookbacks(),
            lag: default_lag(),
            critical_value: default_critical_value(),
        }
    }
}

impl GateParams {
    pub fn with_lookbacks(mut self, lookbacks: Vec<usize>) -> Self {
        self.lookbacks = lookbacks;
        self
    }

    pub fn with_critical_value(mut self, critical_value: f64) -> Self {
        self.critical_value = critical_value;
        self
    }

    /// Bars of history the gate needs for its longest sub-window.
    pub fn longest_lookback(&self) -> usize {
        self.lookbacks.iter().copied().max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.lookbacks.is_empty() {
            return Err(ParamsError::EmptyGateWindows);
        }
        for &lookback in &self.lookbacks {
            if lookback < 20 || lookback < 4 + 2 * self.lag {
                return Err(ParamsError::GateWindowTooShort(lookback, self.lag));
            }
        }
        if self.critical_value >= 0.0 || !self.critical_value.is_finite() {
            return Err(ParamsError::InvalidCriticalValue(self.critical_value));
        }
        Ok(())
    }
}

/// The full pipeline parameter bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default)]
    pub spread: SpreadParams,
    #[serde(default)]
    pub signals: SignalParams,
    #[serde(default)]
    pub risk: RiskParams,
    #[serde(default)]
    pub gate: GateParams,
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.spread.validate()?;
        self.signals.validate()?;
        self.risk.validate()?;
        self.gate.validate()?;
        Ok(())
    }

    /// Bars of history a pair needs before it can be evaluated at all.
    pub fn min_history(&self) -> usize {
        self.spread.window.max(self.gate.longest_lookback())
    }
}

/// Parameter validation errors, all fatal at startup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid spread window: {0} (minimum 10)")]
    InvalidWindow(usize),
    #[error("Entry threshold {entry} must exceed exit threshold {exit}")]
    InvalidThresholds { entry: f64, exit: f64 },
    #[error("Invalid exit threshold: {0} (must be >= 0)")]
    InvalidExit(f64),
    #[error("Invalid stop-loss fraction: {0} (must be 0 < f <= 1)")]
    InvalidStopLoss(f64),
    #[error("Invalid max hold: {0} bars (minimum 1)")]
    InvalidMaxHold(u64),
    #[error("Invalid position size: {0}")]
    InvalidPositionSize(f64),
    #[error("Stationarity gate needs at least one lookback window")]
    EmptyGateWindows,
    #[error("Gate lookback {0} too short for lag {1}")]
    GateWindowTooShort(usize, usize),
    #[error("Invalid critical value: {0} (must be negative)")]
    InvalidCriticalValue(f64),
}
