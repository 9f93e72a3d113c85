//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Replay: CSV-backed market data feed with a bar cursor
//! - Synthetic: seeded cointegrated data generator
//! - Console: human-readable report sink
//! - CLI: command-line interface handlers

pub mod cli;
pub mod console;
pub mod replay;
pub mod synthetic;

pub use cli::CliApp;
pub use console::ConsoleSink;
pub use replay::{ReplayError, ReplayFeed};
pub use synthetic::{SyntheticConfig, SyntheticError};
