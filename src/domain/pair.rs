use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two instruments tracked as one spread relationship.
///
/// Symbols are exchange-style (`BTC/USDT`); the pair name is derived from
/// the base currencies (`BTC_ETH`) unless configured explicitly. Multiple
/// pairs may share an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub asset_a: String,
    pub asset_b: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum PairError {
    #[error("Empty symbol in pair definition")]
    EmptySymbol,
    #[error("Pair legs must differ: {0}")]
    IdenticalLegs(String),
}

impl Pair {
    pub fn new(asset_a: impl Into<String>, asset_b: impl Into<String>) -> Result<Self, PairError> {
        let asset_a = asset_a.into();
        let asset_b = asset_b.into();
        let name = format!("{}_{}", base_symbol(&asset_a), base_symbol(&asset_b));
        Self::named(asset_a, asset_b, name)
    }

    pub fn named(
        asset_a: impl Into<String>,
        asset_b: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, PairError> {
        let asset_a = asset_a.into();
        let asset_b = asset_b.into();
        let name = name.into();

        if asset_a.trim().is_empty() || asset_b.trim().is_empty() || name.trim().is_empty() {
            return Err(PairError::EmptySymbol);
        }
        if asset_a == asset_b {
            return Err(PairError::IdenticalLegs(asset_a));
        }

        Ok(Self {
            asset_a,
            asset_b,
            name,
        })
    }

    /// Both leg symbols, a first.
    pub fn symbols(&self) -> [&str; 2] {
        [&self.asset_a, &self.asset_b]
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Base currency of an exchange symbol: `BTC/USDT` -> `BTC`.
fn base_symbol(symbol: &str) -> &str {
    symbol.split(['/', '-']).next().unwrap_or(symbol)
}
