//! Console Report Sink
//!
//! Human-readable monitor output for interactive runs: one block per
//! cycle with a pair row each, plus trade events as they happen. This is
//! operator output, so it prints regardless of the log filter.

use crate::application::report::{CycleReport, PairReport};
use crate::domain::{AccountSummary, TradeEvent};
use crate::ports::reporting::ReportSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl ReportSink for ConsoleSink {
    fn cycle_report(&self, report: &CycleReport) {
        println!();
        println!("{}", format_header(report));
        for pair in &report.pairs {
            println!("  {}", format_pair(pair));
        }
        println!("  {}", format_account(&report.account));
    }

    fn trade_event(&self, event: &TradeEvent) {
        println!("{}", format_event(event));
    }
}

fn format_header(report: &CycleReport) -> String {
    format!(
        "cycle {} | {} | auto {} | evaluated {}/{} | stationary {} | signals {}",
        report.cycle,
        report.timestamp.format("%Y-%m-%d %H:%M:%S"),
        if report.auto_trading { "on" } else { "off" },
        report.evaluated_pairs,
        report.total_pairs,
        report.stationary_pairs,
        report.signal_count,
    )
}

fn format_pair(pair: &PairReport) -> String {
    if let Some(reason) = &pair.skipped {
        return format!("{:<12} skipped: {reason}", pair.pair);
    }
    let gate = if pair.stationary() { "pass" } else { "FAIL" };
    let position = match pair.position {
        Some(direction) => direction.to_string(),
        None => "flat".to_string(),
    };
    format!(
        "{:<12} z {:>7} | gate {gate} | {:<21} | pos {position}",
        pair.pair,
        format_z(pair.z_score),
        pair.signal.to_string(),
    )
}

fn format_account(account: &AccountSummary) -> String {
    format!(
        "equity {:.2} | cash {:.2} | floating {:+.2} | realized {:+.2} | dd {:.1}% | win {:.0}% | open {} | closed {}",
        account.equity,
        account.cash,
        account.floating_pnl,
        account.realized_pnl,
        account.drawdown * 100.0,
        account.win_rate * 100.0,
        account.open_positions,
        account.closed_trades,
    )
}

fn format_event(event: &TradeEvent) -> String {
    match event {
        TradeEvent::Opened(open) => format!(
            ">> OPEN  {} {} ({:?}) size {:.2} @ z {:+.2}",
            open.pair, open.direction, open.origin, open.size, open.entry_z,
        ),
        TradeEvent::Closed(trade) => format!(
            "<< CLOSE {} {} pnl {:+.2} after {} bars",
            trade.pair, trade.reason, trade.realized_pnl, trade.bars_held,
        ),
    }
}

fn format_z(z: Option<f64>) -> String {
    match z {
        Some(value) => format!("{value:+.2}"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CloseReason, Direction, OpenOrigin, Pair, Signal};
    use crate::application::report::SkipReason;
    use chrono::{TimeZone, Utc};

    fn account() -> AccountSummary {
        AccountSummary {
            cash: 9_000.0,
            exposure: 1_000.0,
            floating_pnl: 12.5,
            realized_pnl: -3.0,
            equity: 10_009.5,
            peak_equity: 10_020.0,
            drawdown: 0.001,
            max_drawdown: 0.002,
            open_positions: 1,
            closed_trades: 2,
            win_rate: 0.5,
        }
    }

    #[test]
    fn test_header_line() {
        let report = CycleReport::new(
            7,
            Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
            true,
            vec![],
            account(),
        );
        let line = format_header(&report);
        assert!(line.starts_with("cycle 7 | "));
        assert!(line.contains("auto on"));
        assert!(line.contains("evaluated 0/0"));
    }

    #[test]
    fn test_pair_row_with_position() {
        let pair = Pair::new("BTC/USDT", "ETH/USDT").unwrap();
        let mut report = PairReport::skipped(
            &pair,
            SkipReason::MissingPrice {
                symbol: "BTC/USDT".to_string(),
            },
            None,
            None,
            None,
        );
        report.skipped = None;
        report.z_score = Some(1.83);
        report.signal = Signal::EnterShortALongB;
        report.position = Some(Direction::ShortALongB);

        let line = format_pair(&report);
        assert!(line.contains("BTC_ETH"));
        assert!(line.contains("z   +1.83"));
        assert!(line.contains("gate FAIL"));
        assert!(line.contains("pos short_a_long_b"));
    }

    #[test]
    fn test_skipped_row() {
        let pair = Pair::new("BTC/USDT", "ETH/USDT").unwrap();
        let report = PairReport::skipped(
            &pair,
            SkipReason::MissingPrice {
                symbol: "ETH/USDT".to_string(),
            },
            Some(50_000.0),
            None,
            None,
        );
        let line = format_pair(&report);
        assert!(line.contains("skipped: no current price for ETH/USDT"));
    }

    #[test]
    fn test_account_line() {
        let line = format_account(&account());
        assert!(line.contains("equity 10009.50"));
        assert!(line.contains("floating +12.50"));
        assert!(line.contains("realized -3.00"));
        assert!(line.contains("win 50%"));
    }

    #[test]
    fn test_close_event_line() {
        let event = TradeEvent::Closed(crate::domain::ClosedTrade {
            pair: "BTC_ETH".to_string(),
            direction: Direction::ShortALongB,
            origin: OpenOrigin::Signal,
            size: 1_000.0,
            entry_time: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
            exit_time: Utc.timestamp_opt(1_700_003_600, 0).single().unwrap(),
            bars_held: 4,
            entry_z: 1.6,
            exit_z: Some(0.2),
            entry_price_a: 50_000.0,
            entry_price_b: 3_000.0,
            exit_price_a: 49_500.0,
            exit_price_b: 3_010.0,
            realized_pnl: 6.64,
            reason: CloseReason::SignalExit,
        });
        let line = format_event(&event);
        assert!(line.contains("<< CLOSE BTC_ETH signal_exit pnl +6.64 after 4 bars"));
    }
}
