//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data feeds (price history, live prices, bar advancement)
//! - Outbound reporting (cycle reports, trade events)

pub mod market_data;
pub mod mocks;
pub mod reporting;

pub use market_data::{MarketDataError, MarketDataPort};
pub use reporting::ReportSink;
