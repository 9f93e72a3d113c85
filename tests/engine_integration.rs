//! Pairs Engine Integration Tests
//!
//! Integration tests that verify the decision pipeline works end to end:
//! 1. Signal flow: z-score entries and exits moving the ledger
//! 2. Risk overrides: stop-loss and max-hold forcing closes
//! 3. Manual control: operator commands through the coordinator handle
//! 4. Shutdown, persistence and the synthetic data path
//!
//! All tests are deterministic (no live feed) and run against scripted
//! fixture data or seeded synthetic series.

use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;
use statrs::statistics::Statistics;

use statarb::adapters::{synthetic, SyntheticConfig};
use statarb::application::{Coordinator, SkipReason};
use statarb::domain::{
    CloseReason, Direction, Ledger, LedgerSnapshot, OpenOrigin, Pair, PnlModel, Signal,
    TradeEvent,
};
use statarb::ports::mocks::{FixtureMarketData, RecordingSink};
use statarb::strategy::{RiskParams, StrategyParams};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Rolling window used by the default spread parameters.
const WINDOW: usize = 35;

/// Mean-reverting close series around 10.0, strongly stationary.
fn reverting_closes(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.25).unwrap();
    let mut closes = Vec::with_capacity(len);
    let mut x = 0.0;
    for _ in 0..len {
        x = 0.5 * x + noise.sample(&mut rng);
        closes.push(10.0 + x);
    }
    closes
}

/// Linear ramp. Differencing it leaves a constant column, so the
/// stationarity gate fails on every lookback.
fn trending_closes(len: usize) -> Vec<f64> {
    (0..len).map(|t| 10.0 + 0.1 * t as f64).collect()
}

/// Price for leg A that puts the live z-score at `target` when leg B
/// trades at a constant 1.0.
fn price_at_z(closes: &[f64], target: f64) -> f64 {
    let tail = &closes[closes.len() - WINDOW..];
    let mean = tail.mean();
    let std = tail.std_dev();
    mean + target * std
}

fn pair(asset_a: &str, asset_b: &str) -> Pair {
    Pair::new(asset_a, asset_b).unwrap()
}

/// Feed with one tradable pair: leg A follows `closes`, leg B is pinned
/// at 1.0 so the ratio spread equals the A series.
fn single_pair_feed(closes: &[f64], live_a: f64) -> Arc<FixtureMarketData> {
    Arc::new(
        FixtureMarketData::new()
            .with_history("AAA/USDT", closes.to_vec())
            .with_history("BBB/USDT", vec![1.0; closes.len()])
            .with_price("AAA/USDT", live_a)
            .with_price("BBB/USDT", 1.0),
    )
}

/// Coordinator over a 10k account with a zero interval so tests never sleep.
fn build_coordinator(
    pairs: Vec<Pair>,
    params: StrategyParams,
    feed: Arc<FixtureMarketData>,
    sink: Arc<RecordingSink>,
) -> Coordinator {
    let ledger = Ledger::new(10_000.0, PnlModel::default());
    Coordinator::new(pairs, params, ledger, feed)
        .unwrap()
        .with_sink(sink)
        .with_interval(Duration::from_secs(0))
}

fn single_pair_coordinator(
    feed: Arc<FixtureMarketData>,
    sink: Arc<RecordingSink>,
) -> Coordinator {
    build_coordinator(
        vec![pair("AAA/USDT", "BBB/USDT")],
        StrategyParams::default(),
        feed,
        sink,
    )
}

// ============================================================================
// Signal Flow: entries and exits through the full pipeline
// ============================================================================

mod signal_flow {
    use super::*;

    /// Test: A stretched spread opens a short-A position and a reverted
    /// spread closes it at a profit.
    #[tokio::test]
    async fn test_entry_then_signal_exit_realizes_profit() {
        let closes = reverting_closes(150, 5);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.8));
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = single_pair_coordinator(feed.clone(), sink.clone());

        let report = coordinator.run_cycle().await.unwrap();
        assert_eq!(report.pairs[0].signal, Signal::EnterShortALongB);
        assert_eq!(coordinator.ledger().open_count(), 1);
        let entry_price = coordinator
            .ledger()
            .position("AAA_BBB")
            .unwrap()
            .entry_price_a;

        // Spread reverts inside the exit band.
        let exit_price = price_at_z(&closes, 0.2);
        assert!(exit_price < entry_price);
        feed.set_price("AAA/USDT", exit_price);

        let report = coordinator.run_cycle().await.unwrap();
        assert_eq!(report.pairs[0].signal, Signal::Exit);
        assert_eq!(report.pairs[0].close_reason, Some(CloseReason::SignalExit));
        assert_eq!(coordinator.ledger().open_count(), 0);

        let realized = coordinator.ledger().realized_pnl();
        assert!(realized > 0.0, "short A into a falling spread should win");
        approx::assert_relative_eq!(
            coordinator.ledger().cash(),
            10_000.0 + realized,
            epsilon = 1e-9
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        match &events[1] {
            TradeEvent::Closed(trade) => {
                assert_eq!(trade.reason, CloseReason::SignalExit);
                assert_eq!(trade.direction, Direction::ShortALongB);
                assert!((trade.exit_z.unwrap() - 0.2).abs() < 1e-6);
                assert!(trade.realized_pnl > 0.0);
            }
            other => panic!("expected close event, got {other:?}"),
        }
    }

    /// Test: A pair whose history trends never passes the gate, so no
    /// entry fires even at an extreme z-score.
    #[tokio::test]
    async fn test_trending_pair_is_gated_out() {
        let closes = trending_closes(150);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.8));
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = single_pair_coordinator(feed, sink.clone());

        let report = coordinator.run_cycle().await.unwrap();

        let pair_report = &report.pairs[0];
        assert_eq!(pair_report.signal, Signal::NotStationary);
        assert!(pair_report.z_score.is_some());
        assert!(pair_report.verdict.is_some());
        assert!(!pair_report.stationary());
        assert_eq!(report.signal_count, 0);
        assert_eq!(coordinator.ledger().open_count(), 0);
        assert!(sink.events().is_empty());
    }
}

// ============================================================================
// Risk Flow: forced closes override everything else
// ============================================================================

mod risk_flow {
    use super::*;

    /// Test: A losing position is force-closed once floating PnL breaches
    /// the stop-loss fraction.
    #[tokio::test]
    async fn test_stop_loss_forces_close() {
        let closes = reverting_closes(150, 5);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.8));
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = single_pair_coordinator(feed.clone(), sink.clone());

        coordinator.run_cycle().await.unwrap();
        let entry_price = coordinator
            .ledger()
            .position("AAA_BBB")
            .unwrap()
            .entry_price_a;

        // Short leg A, price rips 25% against us: half the notional is
        // on that leg, so the mark is -125 against a -100 stop.
        feed.set_price("AAA/USDT", entry_price * 1.25);
        let report = coordinator.run_cycle().await.unwrap();

        assert_eq!(report.pairs[0].signal, Signal::Exit);
        assert_eq!(report.pairs[0].close_reason, Some(CloseReason::StopLoss));
        assert_eq!(coordinator.ledger().open_count(), 0);
        approx::assert_relative_eq!(
            coordinator.ledger().realized_pnl(),
            -125.0,
            epsilon = 1e-9
        );
        approx::assert_relative_eq!(
            coordinator.ledger().cash(),
            9_875.0,
            epsilon = 1e-9
        );
    }

    /// Test: A position that neither reverts nor breaches the stop is
    /// closed after the maximum hold time.
    #[tokio::test]
    async fn test_max_hold_forces_close() {
        let closes = reverting_closes(150, 5);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.8));
        let sink = Arc::new(RecordingSink::new());
        let mut params = StrategyParams::default();
        params.risk = RiskParams::default().with_max_hold_bars(3);
        let mut coordinator = build_coordinator(
            vec![pair("AAA/USDT", "BBB/USDT")],
            params,
            feed.clone(),
            sink,
        );

        coordinator.run_cycle().await.unwrap();
        assert_eq!(coordinator.ledger().open_count(), 1);

        // Park the spread between the exit and entry bands so only the
        // hold clock can close it.
        feed.set_price("AAA/USDT", price_at_z(&closes, 0.7));
        for _ in 0..2 {
            let report = coordinator.run_cycle().await.unwrap();
            assert_eq!(report.pairs[0].signal, Signal::Hold);
        }

        let report = coordinator.run_cycle().await.unwrap();
        assert_eq!(report.pairs[0].close_reason, Some(CloseReason::MaxHold));
        assert_eq!(coordinator.ledger().open_count(), 0);

        match coordinator.ledger().history().last().unwrap() {
            TradeEvent::Closed(trade) => {
                assert_eq!(trade.reason, CloseReason::MaxHold);
                assert_eq!(trade.bars_held, 3);
            }
            other => panic!("expected close event, got {other:?}"),
        }
    }

    /// Test: The stop-loss fires even while auto-trading is disabled.
    #[tokio::test]
    async fn test_stop_loss_enforced_while_paused() {
        let closes = reverting_closes(150, 5);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.8));
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = single_pair_coordinator(feed.clone(), sink.clone());
        let handle = coordinator.handle();

        coordinator.run_cycle().await.unwrap();
        let entry_price = coordinator
            .ledger()
            .position("AAA_BBB")
            .unwrap()
            .entry_price_a;

        assert!(handle.set_auto_trading(false));
        feed.set_price("AAA/USDT", entry_price * 1.25);
        let report = coordinator.run_cycle().await.unwrap();

        assert!(!report.auto_trading);
        assert_eq!(report.pairs[0].close_reason, Some(CloseReason::StopLoss));
        assert_eq!(coordinator.ledger().open_count(), 0);
    }
}

// ============================================================================
// Manual Control: operator commands through the handle
// ============================================================================

mod manual_control_flow {
    use super::*;

    /// Test: A manual open skips the stationarity gate but its exit still
    /// follows the signal rules.
    #[tokio::test]
    async fn test_manual_open_bypasses_gate_and_exits_on_signal() {
        let closes = trending_closes(150);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.2));
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = single_pair_coordinator(feed.clone(), sink.clone());
        let handle = coordinator.handle();

        assert!(handle.open_manual("AAA_BBB", Direction::ShortALongB));
        let report = coordinator.run_cycle().await.unwrap();

        // The pair itself is gated out, but the manual order fills.
        assert_eq!(report.pairs[0].signal, Signal::NotStationary);
        assert_eq!(coordinator.ledger().open_count(), 1);
        let position = coordinator.ledger().position("AAA_BBB").unwrap();
        assert_eq!(position.origin, OpenOrigin::Manual);
        assert!((position.entry_z - 1.2).abs() < 1e-6);

        feed.set_price("AAA/USDT", price_at_z(&closes, 0.2));
        let report = coordinator.run_cycle().await.unwrap();

        assert_eq!(report.pairs[0].close_reason, Some(CloseReason::SignalExit));
        assert_eq!(coordinator.ledger().open_count(), 0);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            TradeEvent::Opened(record) => assert_eq!(record.origin, OpenOrigin::Manual),
            other => panic!("expected open event, got {other:?}"),
        }
    }

    /// Test: Disabled auto-trading reports entry signals without acting on
    /// them; re-enabling picks the entry up on the next cycle.
    #[tokio::test]
    async fn test_pause_suppresses_entries_until_resumed() {
        let closes = reverting_closes(150, 5);
        let feed = single_pair_feed(&closes, price_at_z(&closes, 1.8));
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator =
            single_pair_coordinator(feed, sink.clone()).with_auto_trading(false);
        let handle = coordinator.handle();

        let report = coordinator.run_cycle().await.unwrap();
        assert!(!report.auto_trading);
        assert_eq!(report.pairs[0].signal, Signal::EnterShortALongB);
        assert_eq!(coordinator.ledger().open_count(), 0);
        assert!(sink.events().is_empty());

        assert!(handle.set_auto_trading(true));
        let report = coordinator.run_cycle().await.unwrap();

        assert!(report.auto_trading);
        assert!(coordinator.auto_trading());
        assert_eq!(coordinator.ledger().open_count(), 1);
    }

    /// Test: close_all flattens every open pair at the next cycle boundary.
    #[tokio::test]
    async fn test_close_all_flattens_the_book() {
        let closes_a = reverting_closes(150, 5);
        let closes_c = reverting_closes(150, 9);
        let feed = Arc::new(
            FixtureMarketData::new()
                .with_history("AAA/USDT", closes_a.clone())
                .with_history("CCC/USDT", closes_c.clone())
                .with_history("BBB/USDT", vec![1.0; 150])
                .with_price("AAA/USDT", price_at_z(&closes_a, 1.8))
                .with_price("CCC/USDT", price_at_z(&closes_c, 1.8))
                .with_price("BBB/USDT", 1.0),
        );
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = build_coordinator(
            vec![pair("AAA/USDT", "BBB/USDT"), pair("CCC/USDT", "BBB/USDT")],
            StrategyParams::default(),
            feed.clone(),
            sink.clone(),
        );
        let handle = coordinator.handle();

        coordinator.run_cycle().await.unwrap();
        assert_eq!(coordinator.ledger().open_count(), 2);

        // Pull both spreads back inside the band so nothing re-enters
        // after the flatten.
        feed.set_price("AAA/USDT", price_at_z(&closes_a, 0.2));
        feed.set_price("CCC/USDT", price_at_z(&closes_c, 0.2));
        assert!(handle.close_all());
        let report = coordinator.run_cycle().await.unwrap();

        assert_eq!(coordinator.ledger().open_count(), 0);
        assert_eq!(report.account.closed_trades, 2);

        let closes: Vec<_> = coordinator
            .ledger()
            .history()
            .iter()
            .filter_map(|event| match event {
                TradeEvent::Closed(trade) => Some(trade),
                _ => None,
            })
            .collect();
        assert_eq!(closes.len(), 2);
        for trade in closes {
            assert_eq!(trade.reason, CloseReason::Manual);
            assert_eq!(trade.bars_held, 1);
            // Flattened before the mark, so they realize at the entry value.
            approx::assert_relative_eq!(trade.realized_pnl, 0.0, epsilon = 1e-9);
        }
        approx::assert_relative_eq!(coordinator.ledger().cash(), 10_000.0, epsilon = 1e-9);
    }
}

// ============================================================================
// Reporting Flow: cycle aggregates stay honest when legs go dark
// ============================================================================

mod reporting_flow {
    use super::*;

    /// Test: A pair missing a live price keeps its report slot as skipped
    /// while the healthy pair is still evaluated.
    #[tokio::test]
    async fn test_cycle_report_counts_skipped_pairs() {
        let closes_a = reverting_closes(150, 5);
        let closes_c = reverting_closes(150, 9);
        let feed = Arc::new(
            FixtureMarketData::new()
                .with_history("AAA/USDT", closes_a.clone())
                .with_history("CCC/USDT", closes_c)
                .with_history("BBB/USDT", vec![1.0; 150])
                .with_price("AAA/USDT", price_at_z(&closes_a, 0.2))
                .with_price("BBB/USDT", 1.0),
        );
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator = build_coordinator(
            vec![pair("AAA/USDT", "BBB/USDT"), pair("CCC/USDT", "BBB/USDT")],
            StrategyParams::default(),
            feed,
            sink.clone(),
        );

        let report = coordinator.run_cycle().await.unwrap();

        assert_eq!(report.total_pairs, 2);
        assert_eq!(report.evaluated_pairs, 1);
        assert_eq!(report.signal_count, 0);
        assert!(!report.pairs[0].is_skipped());
        assert_eq!(
            report.pairs[1].skipped,
            Some(SkipReason::MissingPrice {
                symbol: "CCC/USDT".to_string()
            })
        );
        assert_eq!(sink.reports().len(), 1);
    }
}

// ============================================================================
// Shutdown Flow: run loop termination, flattening and persistence
// ============================================================================

mod shutdown_flow {
    use super::*;

    /// Test: An exhausted feed ends the run loop; close-on-shutdown
    /// flattens the book and the final state lands in the snapshot file.
    #[tokio::test]
    async fn test_run_flattens_and_persists_on_shutdown() {
        let closes = reverting_closes(150, 5);
        let feed = Arc::new(
            FixtureMarketData::new()
                .with_history("AAA/USDT", closes.clone())
                .with_history("BBB/USDT", vec![1.0; 150])
                .with_price("AAA/USDT", price_at_z(&closes, 1.8))
                .with_price("BBB/USDT", 1.0)
                .with_advance_budget(1),
        );
        let sink = Arc::new(RecordingSink::new());
        let state_file = tempfile::NamedTempFile::new().unwrap();
        let mut coordinator = single_pair_coordinator(feed, sink.clone())
            .with_close_on_shutdown(true)
            .with_state_file(state_file.path().to_path_buf());

        coordinator.run().await.unwrap();

        assert_eq!(coordinator.cycle(), 1);
        assert_eq!(coordinator.ledger().open_count(), 0);
        match coordinator.ledger().history().last().unwrap() {
            TradeEvent::Closed(trade) => assert_eq!(trade.reason, CloseReason::Shutdown),
            other => panic!("expected close event, got {other:?}"),
        }

        let snapshot = LedgerSnapshot::load(state_file.path()).unwrap().unwrap();
        assert_eq!(snapshot.ledger.open_count(), 0);
        assert_eq!(snapshot.ledger.history().len(), 2);
        approx::assert_relative_eq!(
            snapshot.ledger.cash(),
            coordinator.ledger().cash(),
            epsilon = 1e-9
        );
    }
}

// ============================================================================
// Synthetic Flow: the generated universe drives the whole engine
// ============================================================================

mod synthetic_flow {
    use super::*;

    /// Test: The full loop runs over a synthetic cointegrated universe and
    /// terminates when the replay is exhausted.
    #[tokio::test]
    async fn test_engine_runs_over_synthetic_universe() {
        let symbols = vec!["AAA/USDT".to_string(), "BBB/USDT".to_string()];
        let config = SyntheticConfig::default().with_bars(160).with_seed(11);
        let params = StrategyParams::default();
        let feed = synthetic::feed(&symbols, &config)
            .unwrap()
            .with_warmup(params.min_history());
        let sink = Arc::new(RecordingSink::new());

        let ledger = Ledger::new(10_000.0, PnlModel::default());
        let mut coordinator = Coordinator::new(
            vec![pair("AAA/USDT", "BBB/USDT")],
            params,
            ledger,
            Arc::new(feed),
        )
        .unwrap()
        .with_sink(sink.clone())
        .with_interval(Duration::from_secs(0));

        coordinator.run().await.unwrap();

        // 160 bars minus the 120-bar warmup leaves 40 evaluated cycles.
        assert_eq!(coordinator.cycle(), 40);
        assert_eq!(sink.reports().len(), 40);
        assert!(coordinator.ledger().equity().is_finite());

        let last = sink.last_report().unwrap();
        assert_eq!(last.total_pairs, 1);
        assert_eq!(last.evaluated_pairs, 1);
    }
}
