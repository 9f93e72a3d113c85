//! Price History
//!
//! Ordered close-price samples per instrument. Insertion order is
//! chronological and timestamps must be strictly increasing; feeds that
//! deliver unordered or duplicate bars are rejected at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One bar: timestamp and close price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("Out-of-order timestamp {next} after {last}")]
    OutOfOrder {
        last: DateTime<Utc>,
        next: DateTime<Utc>,
    },
    #[error("Non-finite close price at {0}")]
    InvalidClose(DateTime<Utc>),
}

/// Chronological close-price series for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pre-collected points, validating order.
    pub fn from_points(points: Vec<PricePoint>) -> Result<Self, SeriesError> {
        let mut series = Self::new();
        for point in points {
            series.push(point)?;
        }
        Ok(series)
    }

    /// Append one bar; rejects non-chronological or non-finite samples.
    pub fn push(&mut self, point: PricePoint) -> Result<(), SeriesError> {
        if !point.close.is_finite() {
            return Err(SeriesError::InvalidClose(point.timestamp));
        }
        if let Some(last) = self.points.last() {
            if point.timestamp <= last.timestamp {
                return Err(SeriesError::OutOfOrder {
                    last: last.timestamp,
                    next: point.timestamp,
                });
            }
        }
        self.points.push(point);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Close prices in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// The most recent `n` points (all of them if shorter).
    pub fn tail(&self, n: usize) -> &[PricePoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }
}
