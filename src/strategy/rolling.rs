//! Rolling Z-Score
//!
//! Statistical filter that measures how far the live spread sits from
//! its recent history.
//!
//! Z-Score Formula: z = (current_spread - rolling_mean) / rolling_std
//!
//! The window covers the last `window` historical spreads and excludes
//! the live value, so the live bar is always measured against the past.
//! Standard deviation is the sample estimate (n - 1 denominator).

use statrs::statistics::Statistics;

/// Guard against division by a numerically flat window.
const MIN_STD_DEV: f64 = 1e-10;

/// One z-score evaluation of the live spread against its window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingSnapshot {
    /// Live spread value being measured.
    pub spread: f64,
    /// Rolling mean of the window.
    pub mean: f64,
    /// Rolling sample standard deviation of the window.
    pub std_dev: f64,
    /// Standardized deviation of the live spread.
    pub z_score: f64,
}

impl RollingSnapshot {
    /// Spread stretched above the upper band.
    pub fn breaches_upper(&self, threshold: f64) -> bool {
        self.z_score > threshold
    }

    /// Spread stretched below the lower band.
    pub fn breaches_lower(&self, threshold: f64) -> bool {
        self.z_score < -threshold
    }

    /// Spread back inside the band.
    pub fn inside(&self, threshold: f64) -> bool {
        self.z_score.abs() < threshold
    }
}

/// Score the live spread against the trailing window of historical spreads.
///
/// Returns `None` when history is shorter than the window, when the window
/// is numerically flat, or when the inputs are not finite. Callers treat
/// `None` as "no data this cycle", never as zero.
pub fn zscore(history: &[f64], current: f64, window: usize) -> Option<RollingSnapshot> {
    if window == 0 || history.len() < window || !current.is_finite() {
        return None;
    }

    let tail = &history[history.len() - window..];
    let mean = tail.mean();
    let std_dev = tail.std_dev();

    if !mean.is_finite() || !std_dev.is_finite() || std_dev < MIN_STD_DEV {
        return None;
    }

    Some(RollingSnapshot {
        spread: current,
        mean,
        std_dev,
        z_score: (current - mean) / std_dev,
    })
}
