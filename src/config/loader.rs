//! Configuration Loader
//!
//! Loads and validates the engine configuration from a TOML file. Every
//! section falls back to its default when absent, so an empty file (or no
//! file at all) yields a runnable paper-trading setup over the built-in
//! pair universe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::domain::{Pair, PnlModel};
use crate::strategy::{GateParams, RiskParams, SignalParams, SpreadParams, StrategyParams};

/// Main configuration structure matching config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub spread: SpreadParams,
    #[serde(default)]
    pub signals: SignalParams,
    #[serde(default)]
    pub risk: RiskParams,
    #[serde(default)]
    pub gate: GateParams,
    #[serde(default)]
    pub account: AccountSection,
    #[serde(default)]
    pub pairs: Vec<PairSection>,
}

/// Evaluation loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Seconds between cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Whether the engine acts on entry/exit signals from the start.
    #[serde(default = "default_auto_trading")]
    pub auto_trading: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            auto_trading: default_auto_trading(),
        }
    }
}

/// Paper account settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSection {
    /// Cash the ledger starts with.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,
    /// Floating PnL model for open positions.
    #[serde(default)]
    pub pnl_model: PnlModel,
    /// Ledger snapshot path; `~` expands to the home directory.
    #[serde(default)]
    pub state_file: Option<String>,
    /// Close every open position when the loop stops cooperatively.
    #[serde(default)]
    pub close_on_shutdown: bool,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            pnl_model: PnlModel::default(),
            state_file: None,
            close_on_shutdown: false,
        }
    }
}

/// One `[[pairs]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PairSection {
    pub asset_a: String,
    pub asset_b: String,
    /// Explicit pair name; derived from the base symbols when absent.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_auto_trading() -> bool {
    true
}

fn default_starting_balance() -> f64 {
    10_000.0
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Validate all configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy_params()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if !(self.account.starting_balance.is_finite() && self.account.starting_balance > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "starting_balance must be positive, got {}",
                self.account.starting_balance
            )));
        }
        if self.risk.position_size > self.account.starting_balance {
            return Err(ConfigError::ValidationError(format!(
                "position_size {} exceeds starting_balance {}",
                self.risk.position_size, self.account.starting_balance
            )));
        }

        let pairs = self.build_pairs()?;
        for (index, pair) in pairs.iter().enumerate() {
            if pairs[..index].iter().any(|p| p.name == pair.name) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate pair name: {}",
                    pair.name
                )));
            }
        }

        Ok(())
    }

    /// The configured pair universe, or the built-in preset when the file
    /// declares none.
    pub fn build_pairs(&self) -> Result<Vec<Pair>, ConfigError> {
        if self.pairs.is_empty() {
            info!("no pairs configured, using the default universe");
            return default_universe();
        }
        self.pairs
            .iter()
            .map(|section| {
                let result = match &section.name {
                    Some(name) => {
                        Pair::named(section.asset_a.clone(), section.asset_b.clone(), name.clone())
                    }
                    None => Pair::new(section.asset_a.clone(), section.asset_b.clone()),
                };
                result.map_err(|e| ConfigError::ValidationError(e.to_string()))
            })
            .collect()
    }

    /// Strategy parameter bundle assembled from the four pipeline sections.
    pub fn strategy_params(&self) -> StrategyParams {
        StrategyParams {
            spread: self.spread.clone(),
            signals: self.signals.clone(),
            risk: self.risk.clone(),
            gate: self.gate.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.engine.interval_secs)
    }

    /// State-file path with `~` expanded.
    pub fn resolved_state_file(&self) -> Option<PathBuf> {
        self.account
            .state_file
            .as_deref()
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }
}

/// Liquid majors preset used when no `[[pairs]]` are configured.
fn default_universe() -> Result<Vec<Pair>, ConfigError> {
    [
        ("BTC/USDT", "ETH/USDT"),
        ("ETH/USDT", "SOL/USDT"),
        ("BTC/USDT", "SOL/USDT"),
    ]
    .into_iter()
    .map(|(a, b)| Pair::new(a, b).map_err(|e| ConfigError::ValidationError(e.to_string())))
    .collect()
}
