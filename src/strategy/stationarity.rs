//! Stationarity Gate
//!
//! Multi-window augmented Dickey-Fuller filter that decides whether a
//! pair's spread is currently mean-reverting enough to trade.
//!
//! Test Regression: dy_t = alpha + beta * y_{t-1} + sum_i gamma_i * dy_{t-i}
//!
//! The test runs independently on each configured trailing sub-window
//! (default 120/90/60 bars). The pair passes only when every window's
//! t-statistic clears the critical value; one weak window blocks it.
//! Windows that are too short or numerically degenerate count as failed,
//! never as errors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strategy::params::GateParams;

/// Dickey-Fuller critical values (regression with constant), approximate,
/// tabulated by sample size as (n, 1%, 5%, 10%).
const DF_CRITICAL_VALUES: &[(usize, f64, f64, f64)] = &[
    (25, -3.75, -3.00, -2.63),
    (50, -3.58, -2.93, -2.60),
    (100, -3.51, -2.89, -2.58),
    (250, -3.46, -2.88, -2.57),
    (500, -3.44, -2.87, -2.57),
];

/// Pivot threshold below which the normal equations count as singular.
const PIVOT_EPSILON: f64 = 1e-12;

/// Why a sub-window could not produce a test statistic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatError {
    #[error("series too short: {have} samples, need {need}")]
    TooShort { have: usize, need: usize },
    #[error("degenerate regression (constant or collinear input)")]
    Degenerate,
}

/// Result of the unit-root test on one sub-window.
#[derive(Debug, Clone, Copy)]
pub struct AdfOutcome {
    /// The t-statistic on the lagged level coefficient.
    pub statistic: f64,
    /// Bucketed approximate p-value from the critical-value table.
    pub p_value: f64,
    /// Regression rows actually used.
    pub observations: usize,
}

/// One sub-window's contribution to the verdict. `statistic` is absent
/// when the window was too short or the regression degenerate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStat {
    pub lookback: usize,
    pub observations: usize,
    pub statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub passed: bool,
}

/// Aggregate verdict over all configured sub-windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationarityVerdict {
    pub stationary: bool,
    pub windows: Vec<WindowStat>,
}

impl StationarityVerdict {
    /// Weakest (least negative) statistic across testable windows.
    pub fn worst_statistic(&self) -> Option<f64> {
        self.windows
            .iter()
            .filter_map(|w| w.statistic)
            .reduce(f64::max)
    }
}

/// Multi-window stationarity filter over a pair's spread history.
#[derive(Debug, Clone)]
pub struct StationarityGate {
    params: GateParams,
}

impl StationarityGate {
    pub fn new(params: GateParams) -> Self {
        Self { params }
    }

    /// Test every configured trailing sub-window of the spread series.
    ///
    /// A window shorter than its lookback, or one whose regression is
    /// degenerate, is recorded as failed; it never aborts the evaluation.
    pub fn check(&self, spreads: &[f64]) -> StationarityVerdict {
        let mut windows = Vec::with_capacity(self.params.lookbacks.len());
        let mut stationary = true;

        for &lookback in &self.params.lookbacks {
            let outcome = if spreads.len() < lookback {
                Err(StatError::TooShort {
                    have: spreads.len(),
                    need: lookback,
                })
            } else {
                adf_statistic(&spreads[spreads.len() - lookback..], self.params.lag)
            };

            let window = match outcome {
                Ok(result) => WindowStat {
                    lookback,
                    observations: result.observations,
                    statistic: Some(result.statistic),
                    p_value: Some(result.p_value),
                    passed: result.statistic <= self.params.critical_value,
                },
                Err(err) => {
                    debug!(lookback, %err, "stationarity window not testable");
                    WindowStat {
                        lookback,
                        observations: 0,
                        statistic: None,
                        p_value: None,
                        passed: false,
                    }
                }
            };

            stationary &= window.passed;
            windows.push(window);
        }

        StationarityVerdict {
            stationary,
            windows,
        }
    }
}

/// Augmented Dickey-Fuller t-statistic on the lagged level coefficient.
///
/// OLS on the normal equations, solved by Gaussian elimination with
/// partial pivoting. The standard error comes from the residual variance
/// and the level coefficient's diagonal entry of the inverse.
pub fn adf_statistic(series: &[f64], lag: usize) -> Result<AdfOutcome, StatError> {
    let n = series.len();
    let regressors = 2 + lag;
    let need = 2 * lag + 4;
    if n < need {
        return Err(StatError::TooShort { have: n, need });
    }

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let rows = diff.len() - lag;

    // Accumulate X'X and X'y row by row; the design matrix is never stored.
    let mut xtx = vec![vec![0.0; regressors]; regressors];
    let mut xty = vec![0.0; regressors];
    let mut row = vec![0.0; regressors];

    let fill_row = |row: &mut [f64], t: usize| {
        row[0] = 1.0;
        row[1] = series[t];
        for i in 1..=lag {
            row[1 + i] = diff[t - i];
        }
    };

    for t in lag..diff.len() {
        fill_row(&mut row, t);
        for a in 0..regressors {
            xty[a] += row[a] * diff[t];
            for b in a..regressors {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }
    for a in 0..regressors {
        for b in 0..a {
            xtx[a][b] = xtx[b][a];
        }
    }

    let beta = solve(xtx.clone(), xty)?;

    let mut sse = 0.0;
    for t in lag..diff.len() {
        fill_row(&mut row, t);
        let fit: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
        let residual = diff[t] - fit;
        sse += residual * residual;
    }
    let sigma2 = sse / (rows - regressors) as f64;

    // Level-coefficient variance needs (X'X)^-1[1][1]; one more solve
    // against the unit vector yields that column.
    let mut unit = vec![0.0; regressors];
    unit[1] = 1.0;
    let inv_col = solve(xtx, unit)?;

    let var_beta = sigma2 * inv_col[1];
    if !var_beta.is_finite() || var_beta <= 0.0 {
        return Err(StatError::Degenerate);
    }

    let statistic = beta[1] / var_beta.sqrt();
    if !statistic.is_finite() {
        return Err(StatError::Degenerate);
    }

    Ok(AdfOutcome {
        statistic,
        p_value: approx_p_value(statistic, rows),
        observations: rows,
    })
}

/// Gaussian elimination with partial pivoting on a copy of the system.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, StatError> {
    let k = b.len();

    for col in 0..k {
        let mut pivot = col;
        for r in (col + 1)..k {
            if a[r][col].abs() > a[pivot][col].abs() {
                pivot = r;
            }
        }
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(StatError::Degenerate);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for r in (col + 1)..k {
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..k {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; k];
    for col in (0..k).rev() {
        let mut sum = b[col];
        for c in (col + 1)..k {
            sum -= a[col][c] * x[c];
        }
        x[col] = sum / a[col][col];
    }
    Ok(x)
}

/// Bucketed p-value from the interpolated critical values.
fn approx_p_value(statistic: f64, observations: usize) -> f64 {
    let (c1, c5, c10) = critical_values_for(observations);
    if statistic < c1 {
        0.005
    } else if statistic < c5 {
        0.025
    } else if statistic < c10 {
        0.075
    } else {
        0.5
    }
}

/// Linear interpolation of the critical-value table by sample size.
fn critical_values_for(n: usize) -> (f64, f64, f64) {
    if n <= DF_CRITICAL_VALUES[0].0 {
        let first = DF_CRITICAL_VALUES[0];
        return (first.1, first.2, first.3);
    }
    for pair in DF_CRITICAL_VALUES.windows(2) {
        let (n1, a1, b1, c1) = pair[0];
        let (n2, a2, b2, c2) = pair[1];
        if n >= n1 && n <= n2 {
            let t = (n - n1) as f64 / (n2 - n1) as f64;
            let lerp = |lo: f64, hi: f64| lo + t * (hi - lo);
            return (lerp(a1, a2), lerp(b1, b2), lerp(c1, c2));
        }
    }
    let last = DF_CRITICAL_VALUES[DF_CRITICAL_VALUES.len() - 1];
    (last.1, last.2, last.3)
}
