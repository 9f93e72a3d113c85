//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the statarb engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::console::ConsoleSink;
use crate::adapters::replay::ReplayFeed;
use crate::adapters::synthetic::{self, SyntheticConfig};
use crate::application::Coordinator;
use crate::config::{load_config, AppConfig};
use crate::domain::{CloseReason, Ledger, LedgerSnapshot, Pair, TradeEvent};
use crate::ports::market_data::MarketDataPort;

/// statarb - Statistical Arbitrage Pairs Trading Engine
#[derive(Parser, Debug)]
#[command(
    name = "statarb",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Statistical arbitrage pairs trading engine",
    long_about = "Evaluates configured instrument pairs for mean-reverting spread \
                  behavior each cycle, gates entries on a multi-window stationarity \
                  test, and tracks positions in a paper ledger."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the evaluation loop
    Run(RunCmd),

    /// Replay data to exhaustion and print a performance summary
    Backtest(BacktestCmd),

    /// Load, validate, and print the resolved configuration
    Check(CheckCmd),
}

/// Start the evaluation loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of per-symbol CSV files to replay; synthetic data when omitted
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Bars of synthetic data to generate
    #[arg(long, value_name = "BARS", default_value = "600")]
    pub bars: usize,

    /// Seed for the synthetic generator
    #[arg(long, value_name = "SEED", default_value = "7")]
    pub seed: u64,

    /// Start with automatic trading disabled (signals are reported, not acted on)
    #[arg(long)]
    pub paused: bool,
}

/// Run a backtest
#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of per-symbol CSV files to replay; synthetic data when omitted
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Bars of synthetic data to generate
    #[arg(long, value_name = "BARS", default_value = "600")]
    pub bars: usize,

    /// Seed for the synthetic generator
    #[arg(long, value_name = "SEED", default_value = "7")]
    pub seed: u64,

    /// Print every closed trade
    #[arg(short, long)]
    pub trades: bool,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Backtest(cmd) => backtest_command(cmd).await,
        Command::Check(cmd) => check_command(cmd).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Handle run command
async fn run_command(cmd: RunCmd) -> Result<()> {
    let config = resolve_config(cmd.config.as_deref())?;
    let pairs = config.build_pairs().context("Failed to build pair universe")?;
    let params = config.strategy_params();

    let feed = build_feed(
        cmd.data_dir.as_deref(),
        &pairs,
        cmd.bars,
        cmd.seed,
        params.min_history(),
    )?;

    let ledger = build_ledger(&config);
    let mut coordinator = Coordinator::new(pairs, params, ledger, feed)
        .context("Failed to create coordinator")?
        .with_interval(config.interval())
        .with_auto_trading(config.engine.auto_trading && !cmd.paused)
        .with_close_on_shutdown(config.account.close_on_shutdown)
        .with_sink(Arc::new(ConsoleSink::new()));
    if let Some(path) = config.resolved_state_file() {
        coordinator = coordinator.with_state_file(path);
    }

    if cmd.paused {
        warn!("automatic trading disabled, signals will be reported only");
    }

    let handle = coordinator.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received");
        handle.stop().await;
    });

    coordinator.run().await.context("Engine run failed")?;
    Ok(())
}

/// Handle backtest command
async fn backtest_command(cmd: BacktestCmd) -> Result<()> {
    let config = resolve_config(cmd.config.as_deref())?;
    let pairs = config.build_pairs().context("Failed to build pair universe")?;
    let params = config.strategy_params();

    let feed = build_feed(
        cmd.data_dir.as_deref(),
        &pairs,
        cmd.bars,
        cmd.seed,
        params.min_history(),
    )?;

    let ledger = Ledger::new(config.account.starting_balance, config.account.pnl_model);
    let mut coordinator = Coordinator::new(pairs, params, ledger, feed)
        .context("Failed to create coordinator")?
        .with_interval(Duration::from_secs(0))
        .with_close_on_shutdown(true);

    coordinator.run().await.context("Backtest run failed")?;

    print_backtest_summary(&coordinator, cmd.trades);
    Ok(())
}

/// Handle check command
async fn check_command(cmd: CheckCmd) -> Result<()> {
    let config = resolve_config(cmd.config.as_deref())?;
    let pairs = config.build_pairs()?;
    let params = config.strategy_params();

    println!("Configuration OK");
    println!();
    println!("Engine:");
    println!("  Interval:        {}s", config.engine.interval_secs);
    println!("  Auto trading:    {}", config.engine.auto_trading);
    println!("Spread:");
    println!("  Transform:       {}", config.spread.transform);
    println!("  Window:          {} bars", config.spread.window);
    println!("Signals:");
    println!("  Entry z:         {}", config.signals.entry_z);
    println!("  Exit z:          {}", config.signals.exit_z);
    println!("Risk:");
    println!("  Stop loss:       {:.1}% of notional", config.risk.stop_loss_fraction * 100.0);
    println!("  Max hold:        {} bars", config.risk.max_hold_bars);
    println!("  Position size:   {:.2}", config.risk.position_size);
    println!("Gate:");
    println!("  Lookbacks:       {}", join_lookbacks(&config.gate.lookbacks));
    println!("  Lag:             {}", config.gate.lag);
    println!("  Critical value:  {}", config.gate.critical_value);
    println!("Account:");
    println!("  Starting balance: {:.2}", config.account.starting_balance);
    println!("  PnL model:        {:?}", config.account.pnl_model);
    match config.resolved_state_file() {
        Some(path) => println!("  State file:       {}", path.display()),
        None => println!("  State file:       (none)"),
    }
    println!("  Close on shutdown: {}", config.account.close_on_shutdown);
    println!("Pairs ({} history bars required):", params.min_history());
    for pair in &pairs {
        println!("  {:<12} {} / {}", pair.name, pair.asset_a, pair.asset_b);
    }

    Ok(())
}

/// Load the config file, or fall back to full defaults when none given.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(raw) => {
            let expanded = expand_path(raw);
            let config = load_config(&expanded)
                .with_context(|| format!("Failed to load {}", expanded.display()))?;
            info!(config = %expanded.display(), "configuration loaded");
            Ok(config)
        }
        None => {
            let config = AppConfig::default();
            config.validate().context("Default configuration invalid")?;
            info!("no config file given, using built-in defaults");
            Ok(config)
        }
    }
}

/// Replay feed from a data directory, or a synthetic universe without one.
/// Either way the cursor starts past the warm-up window.
fn build_feed(
    data_dir: Option<&Path>,
    pairs: &[Pair],
    bars: usize,
    seed: u64,
    warmup: usize,
) -> Result<Arc<dyn MarketDataPort>> {
    let feed = match data_dir {
        Some(dir) => {
            let expanded = expand_path(dir);
            ReplayFeed::from_dir(&expanded)
                .with_context(|| format!("Failed to load replay data from {}", expanded.display()))?
        }
        None => {
            let symbols = unique_symbols(pairs);
            let config = SyntheticConfig::default().with_bars(bars).with_seed(seed);
            synthetic::feed(&symbols, &config).context("Failed to generate synthetic data")?
        }
    };
    Ok(Arc::new(feed.with_warmup(warmup)))
}

fn build_ledger(config: &AppConfig) -> Ledger {
    let fresh = Ledger::new(config.account.starting_balance, config.account.pnl_model);
    match config.resolved_state_file() {
        Some(path) => LedgerSnapshot::restore_or(&path, fresh),
        None => fresh,
    }
}

fn print_backtest_summary(coordinator: &Coordinator, trades: bool) {
    let ledger = coordinator.ledger();
    let stats = ledger.stats();

    if trades {
        println!();
        println!("Closed Trades:");
        for event in ledger.history() {
            if let TradeEvent::Closed(trade) = event {
                println!(
                    "  {:<12} {} {} pnl {:+.2} after {} bars",
                    trade.pair, trade.direction, trade.reason, trade.realized_pnl, trade.bars_held,
                );
            }
        }
    }

    println!();
    println!("Backtest Results");
    println!("================");
    println!("  Cycles:        {}", coordinator.cycle());
    println!("  Trades:        {}", stats.closed_trades);
    println!("  Win rate:      {:.1}%", stats.win_rate() * 100.0);
    println!("  Realized PnL:  {:+.2}", ledger.realized_pnl());
    println!("  Final equity:  {:.2}", ledger.equity());
    println!("  Peak equity:   {:.2}", ledger.peak_equity());
    println!("  Max drawdown:  {:.2}%", ledger.summary().max_drawdown * 100.0);
    println!("  Closes by reason:");
    for reason in [
        CloseReason::SignalExit,
        CloseReason::StopLoss,
        CloseReason::MaxHold,
        CloseReason::Manual,
        CloseReason::Shutdown,
    ] {
        let count = ledger
            .history()
            .iter()
            .filter(|event| matches!(event, TradeEvent::Closed(t) if t.reason == reason))
            .count();
        println!("    {:<12} {}", reason.to_string(), count);
    }
}

fn unique_symbols(pairs: &[Pair]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for pair in pairs {
        for symbol in pair.symbols() {
            if !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
        }
    }
    symbols
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn join_lookbacks(lookbacks: &[usize]) -> String {
    lookbacks
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
