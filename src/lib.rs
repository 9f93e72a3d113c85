//! statarb - Statistical Arbitrage Pairs Trading Engine
//!
//! Continuously evaluates pairs of correlated instruments for
//! mean-reverting spread behavior and tracks the resulting positions in a
//! paper ledger.
//!
//! # Modules
//!
//! - `domain`: Core state and value types (Pair, PriceSeries, Ledger)
//! - `strategy`: Numeric pipeline (rolling z-score, stationarity gate, signals)
//! - `ports`: Trait abstractions (MarketDataPort, ReportSink) and test fixtures
//! - `application`: Multi-pair Coordinator, cycle reports, control handle
//! - `adapters`: Replay feed, synthetic data, console sink, CLI
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;
