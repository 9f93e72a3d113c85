//! Spread Transform
//!
//! A pair's spread is the relative-price relationship of its two legs,
//! expressed either as a plain ratio or its natural logarithm. Which form is
//! used is configuration, fixed for the process lifetime, and applied
//! identically to the live value and to the history feeding the
//! stationarity gate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadTransform {
    /// `price_a / price_b`
    #[default]
    Ratio,
    /// `ln(price_a / price_b)`
    LogRatio,
}

impl SpreadTransform {
    /// Spread of one aligned sample. Undefined (None) whenever either price
    /// is non-positive or non-finite; such samples are dropped upstream,
    /// never zero-filled.
    pub fn apply(&self, price_a: f64, price_b: f64) -> Option<f64> {
        if !price_a.is_finite() || !price_b.is_finite() || price_a <= 0.0 || price_b <= 0.0 {
            return None;
        }
        let ratio = price_a / price_b;
        match self {
            SpreadTransform::Ratio => Some(ratio),
            SpreadTransform::LogRatio => Some(ratio.ln()),
        }
    }

    /// Spread series from two close-price histories.
    ///
    /// Histories are aligned from the most recent bar backwards (the shorter
    /// leg bounds the output). Undefined samples are dropped.
    pub fn series(&self, closes_a: &[f64], closes_b: &[f64]) -> Vec<f64> {
        let len = closes_a.len().min(closes_b.len());
        let a = &closes_a[closes_a.len() - len..];
        let b = &closes_b[closes_b.len() - len..];
        a.iter()
            .zip(b.iter())
            .filter_map(|(&pa, &pb)| self.apply(pa, pb))
            .collect()
    }
}

impl std::fmt::Display for SpreadTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpreadTransform::Ratio => write!(f, "ratio"),
            SpreadTransform::LogRatio => write!(f, "log_ratio"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ratio() {
        let spread = SpreadTransform::Ratio.apply(30000.0, 2000.0).unwrap();
        assert_relative_eq!(spread, 15.0);
    }

    #[test]
    fn test_log_ratio() {
        let spread = SpreadTransform::LogRatio.apply(30000.0, 2000.0).unwrap();
        assert_relative_eq!(spread, 15.0_f64.ln());
    }

    #[test]
    fn test_non_positive_price_undefined() {
        assert!(SpreadTransform::Ratio.apply(0.0, 2000.0).is_none());
        assert!(SpreadTransform::Ratio.apply(30000.0, -1.0).is_none());
        assert!(SpreadTransform::LogRatio.apply(30000.0, 0.0).is_none());
    }

    #[test]
    fn test_non_finite_price_undefined() {
        assert!(SpreadTransform::Ratio.apply(f64::NAN, 2000.0).is_none());
        assert!(SpreadTransform::Ratio.apply(30000.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_series_aligns_from_tail() {
        // Leg a has one extra old bar that must be ignored.
        let a = vec![99.0, 10.0, 20.0, 30.0];
        let b = vec![1.0, 2.0, 3.0];
        let spreads = SpreadTransform::Ratio.series(&a, &b);
        assert_eq!(spreads, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_series_drops_undefined_samples() {
        let a = vec![10.0, 20.0, 30.0];
        let b = vec![1.0, 0.0, 3.0];
        let spreads = SpreadTransform::Ratio.series(&a, &b);
        assert_eq!(spreads, vec![10.0, 10.0]);
    }

    #[test]
    fn test_default_is_ratio() {
        assert_eq!(SpreadTransform::default(), SpreadTransform::Ratio);
    }
}
