//! Quartile boundaries for each RFV metric

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::MetricsTable;
use crate::model::Metric;

/// Quantile fractions that split a metric into four classes
pub const QUARTILE_FRACTIONS: [f64; 3] = [0.25, 0.50, 0.75];

/// The 25th, 50th and 75th percentile of one metric.
///
/// Thresholds are non-decreasing: `q25 <= q50 <= q75`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
}

impl Quartiles {
    /// Compute quartiles of a set of values, or `None` when it is empty.
    pub fn from_values(values: ArrayView1<'_, f64>) -> Option<Self> {
        let mut sorted = values.to_vec();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let [q25, q50, q75] = QUARTILE_FRACTIONS.map(|q| quantile(&sorted, q));
        Some(Self { q25, q50, q75 })
    }

    /// Threshold for one of [`QUARTILE_FRACTIONS`]
    pub fn at(&self, fraction: f64) -> Option<f64> {
        QUARTILE_FRACTIONS
            .iter()
            .position(|&q| q == fraction)
            .map(|i| self.thresholds()[i])
    }

    pub fn thresholds(&self) -> [f64; 3] {
        [self.q25, self.q50, self.q75]
    }
}

/// Quantile of sorted data using linear interpolation between the two order
/// statistics around position `q * (n - 1)`.
///
/// `sorted` must be non-empty and in ascending order.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    lerp(sorted[lower], sorted[upper], position - lower as f64)
}

// Interpolates from whichever end is closer so that t = 0 and t = 1 return
// the endpoints exactly.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

/// Quartile boundaries for recency, frequency and value, computed once per
/// run and shared by every classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuartileBoundaries {
    pub recency: Quartiles,
    pub frequency: Quartiles,
    pub value: Quartiles,
}

impl QuartileBoundaries {
    /// Compute the boundary table over every customer in `table`.
    pub fn compute(table: &MetricsTable) -> Result<Self> {
        let features = table.feature_matrix();
        let column = |metric: Metric| {
            Quartiles::from_values(features.column(metric.index())).ok_or(Error::EmptyInput)
        };

        Ok(Self {
            recency: column(Metric::Recency)?,
            frequency: column(Metric::Frequency)?,
            value: column(Metric::Value)?,
        })
    }

    pub fn get(&self, metric: Metric) -> &Quartiles {
        match metric {
            Metric::Recency => &self.recency,
            Metric::Frequency => &self.frequency,
            Metric::Value => &self.value,
        }
    }
}
