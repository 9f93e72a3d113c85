//! Multi-Pair Coordinator
//!
//! Drives the evaluation loop: one market snapshot per cycle, every
//! configured pair run through the spread/gate/signal pipeline in
//! sequence, and the resulting actions applied to the ledger. The
//! coordinator owns the ledger exclusively; manual commands arrive on a
//! channel and are applied at cycle boundaries, never mid-evaluation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::application::report::{CycleReport, PairReport, SkipReason};
use crate::domain::{
    CloseReason, Direction, Ledger, LedgerSnapshot, OpenOrigin, Pair, Signal, TradeEvent,
};
use crate::ports::market_data::{MarketDataError, MarketDataPort};
use crate::ports::reporting::ReportSink;
use crate::strategy::{
    rolling, OpenState, ParamsError, SignalDecision, SignalEngine, StationarityGate,
    StrategyParams,
};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ParamsError),
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),
}

/// Manual override commands, queued and applied between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenManual { pair: String, direction: Direction },
    CloseManual { pair: String },
    CloseAll,
    EnableAutoTrading,
    DisableAutoTrading,
}

/// Control surface for a running coordinator.
///
/// Cheap to clone. Commands queue on a channel and take effect at the
/// next cycle boundary, so they never race an in-flight evaluation.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    running: Arc<RwLock<bool>>,
}

impl CoordinatorHandle {
    /// Queue a manual open. Returns false if the coordinator is gone.
    pub fn open_manual(&self, pair: &str, direction: Direction) -> bool {
        self.send(Command::OpenManual {
            pair: pair.to_string(),
            direction,
        })
    }

    /// Queue a manual close for one pair.
    pub fn close_manual(&self, pair: &str) -> bool {
        self.send(Command::CloseManual {
            pair: pair.to_string(),
        })
    }

    /// Queue a close of every open position.
    pub fn close_all(&self) -> bool {
        self.send(Command::CloseAll)
    }

    /// Queue an auto-trading toggle.
    pub fn set_auto_trading(&self, enabled: bool) -> bool {
        if enabled {
            self.send(Command::EnableAutoTrading)
        } else {
            self.send(Command::DisableAutoTrading)
        }
    }

    /// Stop the run loop after the current cycle finishes.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        info!("stop signal sent to coordinator");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }
}

/// The evaluation loop over all configured pairs.
pub struct Coordinator {
    pairs: Vec<Pair>,
    params: StrategyParams,
    engine: SignalEngine,
    gate: StationarityGate,
    market_data: Arc<dyn MarketDataPort>,
    sinks: Vec<Arc<dyn ReportSink>>,
    ledger: Ledger,
    auto_trading: bool,
    cycle: u64,
    interval: Duration,
    state_file: Option<PathBuf>,
    close_on_shutdown: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    command_tx: mpsc::UnboundedSender<Command>,
    running: Arc<RwLock<bool>>,
}

impl Coordinator {
    /// Create a coordinator. Parameters are validated here; an invalid
    /// configuration never gets as far as the first cycle.
    pub fn new(
        pairs: Vec<Pair>,
        params: StrategyParams,
        ledger: Ledger,
        market_data: Arc<dyn MarketDataPort>,
    ) -> Result<Self, CoordinatorError> {
        params.validate()?;
        let (command_tx, commands) = mpsc::unbounded_channel();

        Ok(Self {
            engine: SignalEngine::new(params.signals.clone(), params.risk.clone()),
            gate: StationarityGate::new(params.gate.clone()),
            pairs,
            params,
            market_data,
            sinks: Vec::new(),
            ledger,
            auto_trading: true,
            cycle: 0,
            interval: Duration::from_secs(60),
            state_file: None,
            close_on_shutdown: false,
            commands,
            command_tx,
            running: Arc::new(RwLock::new(false)),
        })
    }

    /// Set the pause between cycles. Zero means no pause (backtests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Attach an outbound report sink.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Start with automatic trading enabled or disabled.
    pub fn with_auto_trading(mut self, enabled: bool) -> Self {
        self.auto_trading = enabled;
        self
    }

    /// Persist a ledger snapshot to this path after every cycle.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Close every open position when the run loop winds down.
    pub fn with_close_on_shutdown(mut self, enabled: bool) -> Self {
        self.close_on_shutdown = enabled;
        self
    }

    /// Handle for stopping the loop and queueing manual commands.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            commands: self.command_tx.clone(),
            running: Arc::clone(&self.running),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn auto_trading(&self) -> bool {
        self.auto_trading
    }

    /// Run cycles until stopped or the feed is exhausted.
    pub async fn run(&mut self) -> Result<(), CoordinatorError> {
        *self.running.write().await = true;
        info!(
            pairs = self.pairs.len(),
            interval_secs = self.interval.as_secs(),
            auto_trading = self.auto_trading,
            "coordinator started"
        );

        while *self.running.read().await {
            if !self.market_data.advance().await {
                info!("market data exhausted, stopping");
                break;
            }
            match self.run_cycle().await {
                Ok(report) => debug!(
                    cycle = report.cycle,
                    signals = report.signal_count,
                    "cycle complete"
                ),
                Err(err) => error!(error = %err, "cycle failed"),
            }
            self.pause().await;
        }

        self.shutdown().await;
        Ok(())
    }

    /// Execute one full evaluation cycle.
    ///
    /// A pair with missing prices or short history is skipped without
    /// touching its position or the other pairs. Only a total feed
    /// failure surfaces as an error, and the run loop survives that too.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoordinatorError> {
        self.cycle += 1;
        let now = Utc::now();

        let pending_opens = self.apply_queued_commands(now);

        let symbols = self.unique_symbols();
        let prices = self.market_data.current_prices(&symbols).await?;

        let min_bars = self.params.min_history();
        let mut histories: HashMap<String, Vec<f64>> = HashMap::new();
        let mut history_failures: HashMap<String, SkipReason> = HashMap::new();
        for symbol in &symbols {
            match self.market_data.price_history(symbol, min_bars).await {
                Ok(series) => {
                    histories.insert(symbol.clone(), series.closes());
                }
                Err(err) => {
                    let reason = match err {
                        MarketDataError::InsufficientHistory { symbol, have, need } => {
                            SkipReason::InsufficientHistory { symbol, have, need }
                        }
                        other => SkipReason::FeedError {
                            message: other.to_string(),
                        },
                    };
                    debug!(symbol = symbol.as_str(), %reason, "history unavailable");
                    history_failures.insert(symbol.clone(), reason);
                }
            }
        }

        let pairs = self.pairs.clone();
        let mut reports = Vec::with_capacity(pairs.len());
        let mut pair_z: HashMap<String, Option<f64>> = HashMap::new();

        for pair in &pairs {
            let name = pair.name.as_str();
            let [sym_a, sym_b] = pair.symbols();
            let price_a = prices.get(sym_a).copied();
            let price_b = prices.get(sym_b).copied();
            let position_dir = self.ledger.position(name).map(|p| p.direction);

            // A leg without a live price sits out this cycle untouched.
            let (pa, pb) = match (price_a, price_b) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    let missing = if price_a.is_none() { sym_a } else { sym_b };
                    let reason = SkipReason::MissingPrice {
                        symbol: missing.to_string(),
                    };
                    debug!(pair = name, %reason, "pair skipped");
                    reports.push(PairReport::skipped(
                        pair,
                        reason,
                        price_a,
                        price_b,
                        position_dir,
                    ));
                    continue;
                }
            };

            if let Some(reason) = [sym_a, sym_b]
                .iter()
                .find_map(|s| history_failures.get(*s))
            {
                debug!(pair = name, %reason, "pair skipped");
                reports.push(PairReport::skipped(
                    pair,
                    reason.clone(),
                    price_a,
                    price_b,
                    position_dir,
                ));
                continue;
            }

            let closes_a = &histories[sym_a];
            let closes_b = &histories[sym_b];
            let transform = self.params.spread.transform;
            let spreads = transform.series(closes_a, closes_b);

            let live_spread = transform.apply(pa, pb);
            let snapshot = live_spread
                .and_then(|s| rolling::zscore(&spreads, s, self.params.spread.window));
            let z = snapshot.map(|s| s.z_score);
            pair_z.insert(pair.name.clone(), z);

            // Mark before evaluating so the signal sees current PnL.
            if self.ledger.position(name).is_some() && live_spread.is_some() {
                if let Err(err) = self.ledger.mark_to_market(name, pa, pb, z) {
                    warn!(pair = name, error = %err, "mark to market failed");
                }
            }

            let verdict = self.gate.check(&spreads);
            let open_state = self.ledger.position(name).map(|p| OpenState {
                floating_pnl: p.floating_pnl,
                size: p.size,
                bars_held: p.bars_held(self.cycle),
            });

            let decision = self.engine.evaluate(z, verdict.stationary, open_state);
            self.apply_decision(pair, decision, z, pa, pb, now);

            reports.push(PairReport {
                pair: pair.name.clone(),
                asset_a: pair.asset_a.clone(),
                asset_b: pair.asset_b.clone(),
                price_a,
                price_b,
                spread: live_spread,
                mean: snapshot.map(|s| s.mean),
                std_dev: snapshot.map(|s| s.std_dev),
                z_score: z,
                verdict: Some(verdict),
                signal: decision.signal,
                close_reason: decision.close_reason,
                position: self.ledger.position(name).map(|p| p.direction),
                skipped: None,
            });
        }

        self.apply_manual_opens(pending_opens, &prices, &pair_z, now);

        let report = CycleReport::new(
            self.cycle,
            now,
            self.auto_trading,
            reports,
            self.ledger.summary(),
        );
        for sink in &self.sinks {
            sink.cycle_report(&report);
        }
        self.persist();

        Ok(report)
    }

    /// Apply one signal decision against the ledger.
    fn apply_decision(
        &mut self,
        pair: &Pair,
        decision: SignalDecision,
        z: Option<f64>,
        price_a: f64,
        price_b: f64,
        now: DateTime<Utc>,
    ) {
        let name = pair.name.as_str();
        match decision.signal {
            Signal::EnterShortALongB | Signal::EnterLongAShortB => {
                if !self.auto_trading {
                    debug!(pair = name, signal = %decision.signal, "entry suppressed");
                    return;
                }
                let direction = match decision.signal.entry_direction() {
                    Some(d) => d,
                    None => return,
                };
                // Entries only fire with a defined z-score.
                let entry_z = match z {
                    Some(value) => value,
                    None => return,
                };
                match self.ledger.open(
                    name,
                    direction,
                    self.params.risk.position_size,
                    entry_z,
                    price_a,
                    price_b,
                    now,
                    self.cycle,
                    OpenOrigin::Signal,
                ) {
                    Ok(record) => self.emit_event(&TradeEvent::Opened(record)),
                    Err(err) => warn!(pair = name, error = %err, "entry rejected"),
                }
            }
            Signal::Exit => {
                let reason = decision.close_reason.unwrap_or(CloseReason::SignalExit);
                if reason == CloseReason::SignalExit && !self.auto_trading {
                    debug!(pair = name, "signal exit suppressed");
                    return;
                }
                match self.ledger.close(name, reason, now, self.cycle) {
                    Ok(trade) => self.emit_event(&TradeEvent::Closed(trade)),
                    Err(err) => warn!(pair = name, error = %err, "exit rejected"),
                }
            }
            Signal::NoData | Signal::NotStationary | Signal::Hold => {}
        }
    }

    /// Drain the command queue. Closes and the auto-trading toggle apply
    /// immediately; manual opens are returned so they can use this
    /// cycle's price snapshot.
    fn apply_queued_commands(&mut self, now: DateTime<Utc>) -> Vec<(String, Direction)> {
        let mut pending_opens = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::OpenManual { pair, direction } => {
                    pending_opens.push((pair, direction));
                }
                Command::CloseManual { pair } => {
                    match self.ledger.close(&pair, CloseReason::Manual, now, self.cycle) {
                        Ok(trade) => self.emit_event(&TradeEvent::Closed(trade)),
                        Err(err) => {
                            warn!(pair = pair.as_str(), error = %err, "manual close rejected")
                        }
                    }
                }
                Command::CloseAll => {
                    let closed = self.ledger.close_all(CloseReason::Manual, now, self.cycle);
                    info!(count = closed.len(), "manual close-all");
                    for trade in closed {
                        self.emit_event(&TradeEvent::Closed(trade));
                    }
                }
                Command::EnableAutoTrading => {
                    self.auto_trading = true;
                    info!("auto trading enabled");
                }
                Command::DisableAutoTrading => {
                    self.auto_trading = false;
                    info!("auto trading disabled");
                }
            }
        }
        pending_opens
    }

    /// Execute queued manual opens with this cycle's snapshot. An open
    /// for an unknown pair or a pair without prices is dropped loudly.
    fn apply_manual_opens(
        &mut self,
        pending: Vec<(String, Direction)>,
        prices: &HashMap<String, f64>,
        pair_z: &HashMap<String, Option<f64>>,
        now: DateTime<Utc>,
    ) {
        for (name, direction) in pending {
            let pair = match self.pairs.iter().find(|p| p.name == name) {
                Some(p) => p,
                None => {
                    warn!(pair = name.as_str(), "manual open for unknown pair");
                    continue;
                }
            };
            let [sym_a, sym_b] = pair.symbols();
            let (pa, pb) = match (
                prices.get(sym_a).copied(),
                prices.get(sym_b).copied(),
            ) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    warn!(pair = name.as_str(), "manual open dropped: prices unavailable");
                    continue;
                }
            };
            let entry_z = pair_z.get(&name).copied().flatten().unwrap_or(0.0);

            match self.ledger.open(
                &name,
                direction,
                self.params.risk.position_size,
                entry_z,
                pa,
                pb,
                now,
                self.cycle,
                OpenOrigin::Manual,
            ) {
                Ok(record) => self.emit_event(&TradeEvent::Opened(record)),
                Err(err) => warn!(pair = name.as_str(), error = %err, "manual open rejected"),
            }
        }
    }

    async fn shutdown(&mut self) {
        *self.running.write().await = false;

        if self.close_on_shutdown && self.ledger.open_count() > 0 {
            let closed = self
                .ledger
                .close_all(CloseReason::Shutdown, Utc::now(), self.cycle);
            info!(count = closed.len(), "open positions closed on shutdown");
            for trade in closed {
                self.emit_event(&TradeEvent::Closed(trade));
            }
        }
        self.persist();

        info!(
            cycles = self.cycle,
            equity = self.ledger.equity(),
            realized_pnl = self.ledger.realized_pnl(),
            closed_trades = self.ledger.stats().closed_trades,
            "coordinator stopped"
        );
    }

    fn emit_event(&self, event: &TradeEvent) {
        for sink in &self.sinks {
            sink.trade_event(event);
        }
    }

    fn persist(&self) {
        if let Some(path) = &self.state_file {
            if let Err(err) = LedgerSnapshot::new(self.ledger.clone()).save(path) {
                warn!(error = %err, "ledger snapshot failed");
            }
        }
    }

    fn unique_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::new();
        for pair in &self.pairs {
            for symbol in pair.symbols() {
                if !symbols.iter().any(|s| s == symbol) {
                    symbols.push(symbol.to_string());
                }
            }
        }
        symbols
    }

    /// Sleep between cycles in short steps so a stop lands promptly.
    async fn pause(&self) {
        let mut remaining = self.interval;
        while !remaining.is_zero() {
            if !*self.running.read().await {
                return;
            }
            let step = remaining.min(Duration::from_secs(1));
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }
}
