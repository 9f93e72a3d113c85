//! Replay Market Data Feed
//!
//! Serves recorded bars one cycle at a time. Each symbol loads from a
//! CSV file (`timestamp,close` rows, epoch seconds or RFC 3339) named
//! after the symbol with `-` standing in for `/`, so `BTC-USDT.csv`
//! feeds `BTC/USDT`. The cursor advances one bar per `advance()` call:
//! `current_prices` serves the cursor bar and `price_history` only the
//! bars strictly before it, which keeps the live value out of the
//! rolling window exactly as in a live feed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{PricePoint, PriceSeries, SeriesError};
use crate::ports::market_data::{MarketDataError, MarketDataPort};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed bar at {path}:{line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Invalid series in {path}: {source}")]
    Series {
        path: PathBuf,
        #[source]
        source: SeriesError,
    },
    #[error("No CSV files found in {0}")]
    Empty(PathBuf),
}

#[derive(Debug)]
pub struct ReplayFeed {
    series: HashMap<String, PriceSeries>,
    total_bars: usize,
    cursor: Mutex<usize>,
}

impl ReplayFeed {
    /// Load every `*.csv` file in a directory, one symbol per file.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| ReplayError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut series = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| ReplayError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let symbol = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.replace('-', "/"),
                None => continue,
            };
            let loaded = load_csv(&path)?;
            debug!(
                symbol = symbol.as_str(),
                bars = loaded.len(),
                "replay series loaded"
            );
            series.insert(symbol, loaded);
        }
        if series.is_empty() {
            return Err(ReplayError::Empty(dir.to_path_buf()));
        }

        let feed = Self::from_series(series);
        info!(
            symbols = feed.series.len(),
            bars = feed.total_bars,
            "replay data loaded"
        );
        Ok(feed)
    }

    /// Wrap pre-built series, e.g. synthetic data.
    pub fn from_series(series: HashMap<String, PriceSeries>) -> Self {
        let total_bars = series.values().map(|s| s.len()).max().unwrap_or(0);
        Self {
            series,
            total_bars,
            cursor: Mutex::new(0),
        }
    }

    /// Pre-position the cursor so the first served cycle already has
    /// `bars` bars of history behind the live value.
    pub fn with_warmup(self, bars: usize) -> Self {
        Self {
            cursor: Mutex::new(bars.min(self.total_bars)),
            ..self
        }
    }

    /// Length of the longest loaded series.
    pub fn total_bars(&self) -> usize {
        self.total_bars
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

#[async_trait]
impl MarketDataPort for ReplayFeed {
    async fn price_history(
        &self,
        symbol: &str,
        min_bars: usize,
    ) -> Result<PriceSeries, MarketDataError> {
        let series = self.series.get(symbol).ok_or_else(|| {
            MarketDataError::Unavailable(format!("no replay data for {symbol}"))
        })?;
        let played = *self.cursor.lock().await;
        let available = played.saturating_sub(1).min(series.len());
        if available < min_bars {
            return Err(MarketDataError::InsufficientHistory {
                symbol: symbol.to_string(),
                have: available,
                need: min_bars,
            });
        }
        PriceSeries::from_points(series.points()[..available].to_vec())
            .map_err(|e| MarketDataError::Feed(e.to_string()))
    }

    async fn current_prices(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, f64>, MarketDataError> {
        let played = *self.cursor.lock().await;
        let mut prices = HashMap::new();
        let index = match played.checked_sub(1) {
            Some(i) => i,
            None => return Ok(prices),
        };
        for symbol in symbols {
            if let Some(series) = self.series.get(symbol) {
                if let Some(point) = series.points().get(index) {
                    prices.insert(symbol.clone(), point.close);
                }
            }
        }
        Ok(prices)
    }

    async fn advance(&self) -> bool {
        let mut played = self.cursor.lock().await;
        if *played >= self.total_bars {
            return false;
        }
        *played += 1;
        true
    }
}

fn load_csv(path: &Path) -> Result<PriceSeries, ReplayError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut series = PriceSeries::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let (ts_field, close_field) = match line.split_once(',') {
            Some(parts) => parts,
            None => {
                return Err(ReplayError::Malformed {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: "expected timestamp,close".to_string(),
                })
            }
        };
        let timestamp = match parse_timestamp(ts_field.trim()) {
            Some(ts) => ts,
            // A non-timestamp first row is a header.
            None if idx == 0 => continue,
            None => {
                return Err(ReplayError::Malformed {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: format!("bad timestamp: {ts_field}"),
                })
            }
        };
        let close: f64 = close_field.trim().parse().map_err(|_| ReplayError::Malformed {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: format!("bad close: {close_field}"),
        })?;
        series
            .push(PricePoint::new(timestamp, close))
            .map_err(|source| ReplayError::Series {
                path: path.to_path_buf(),
                source,
            })?;
    }
    Ok(series)
}

fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = field.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    DateTime::parse_from_rfc3339(field)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, rows: &[(i64, f64)]) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        for (ts, close) in rows {
            writeln!(file, "{ts},{close}").unwrap();
        }
    }

    #[tokio::test]
    async fn test_cursor_serves_one_bar_per_advance() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA.csv", &[(100, 1.0), (200, 2.0), (300, 3.0)]);
        let feed = ReplayFeed::from_dir(dir.path()).unwrap();
        let symbols = vec!["AAA".to_string()];

        assert!(feed.current_prices(&symbols).await.unwrap().is_empty());

        assert!(feed.advance().await);
        let prices = feed.current_prices(&symbols).await.unwrap();
        assert_eq!(prices["AAA"], 1.0);

        assert!(feed.advance().await);
        let prices = feed.current_prices(&symbols).await.unwrap();
        assert_eq!(prices["AAA"], 2.0);
    }

    #[tokio::test]
    async fn test_history_excludes_current_bar() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA.csv", &[(100, 1.0), (200, 2.0), (300, 3.0)]);
        let feed = ReplayFeed::from_dir(dir.path()).unwrap();

        feed.advance().await;
        feed.advance().await;
        feed.advance().await;

        let history = feed.price_history("AAA", 2).await.unwrap();
        assert_eq!(history.closes(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_short_history_reports_have_and_need() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA.csv", &[(100, 1.0), (200, 2.0)]);
        let feed = ReplayFeed::from_dir(dir.path()).unwrap();
        feed.advance().await;
        feed.advance().await;

        let err = feed.price_history("AAA", 5).await.unwrap_err();
        match err {
            MarketDataError::InsufficientHistory { have, need, .. } => {
                assert_eq!(have, 1);
                assert_eq!(need, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_advance_false_at_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA.csv", &[(100, 1.0), (200, 2.0)]);
        let feed = ReplayFeed::from_dir(dir.path()).unwrap();

        assert!(feed.advance().await);
        assert!(feed.advance().await);
        assert!(!feed.advance().await);
    }

    #[tokio::test]
    async fn test_warmup_positions_cursor() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "AAA.csv",
            &[(100, 1.0), (200, 2.0), (300, 3.0), (400, 4.0)],
        );
        let feed = ReplayFeed::from_dir(dir.path()).unwrap().with_warmup(2);
        feed.advance().await;

        let prices = feed
            .current_prices(&["AAA".to_string()])
            .await
            .unwrap();
        assert_eq!(prices["AAA"], 3.0);
        let history = feed.price_history("AAA", 2).await.unwrap();
        assert_eq!(history.closes(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_filename_maps_to_symbol() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "BTC-USDT.csv", &[(100, 50_000.0)]);
        let feed = ReplayFeed::from_dir(dir.path()).unwrap();
        assert_eq!(feed.symbols(), vec!["BTC/USDT".to_string()]);
    }

    #[tokio::test]
    async fn test_rfc3339_rows_and_header_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("AAA.csv")).unwrap();
        writeln!(file, "timestamp,close").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,1.5").unwrap();
        writeln!(file, "2024-01-01T01:00:00Z,2.5").unwrap();
        drop(file);

        let feed = ReplayFeed::from_dir(dir.path()).unwrap();
        assert_eq!(feed.total_bars(), 2);
        feed.advance().await;
        let prices = feed.current_prices(&["AAA".to_string()]).await.unwrap();
        assert_eq!(prices["AAA"], 1.5);
    }

    #[tokio::test]
    async fn test_malformed_row_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("AAA.csv")).unwrap();
        writeln!(file, "100,1.0").unwrap();
        writeln!(file, "200,not-a-price").unwrap();
        drop(file);

        let err = ReplayFeed::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ReplayError::Malformed { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReplayFeed::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ReplayError::Empty(_)));
    }

    #[tokio::test]
    async fn test_missing_symbol_omitted_from_prices() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA.csv", &[(100, 1.0), (200, 2.0)]);
        write_csv(dir.path(), "BBB.csv", &[(100, 9.0)]);
        let feed = ReplayFeed::from_dir(dir.path()).unwrap();
        let symbols = vec!["AAA".to_string(), "BBB".to_string()];

        feed.advance().await;
        feed.advance().await;

        // BBB ran out of bars, AAA keeps quoting.
        let prices = feed.current_prices(&symbols).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["AAA"], 2.0);
    }
}
