//! Domain records: transactions, customer identifiers and the RFV metrics

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Customer identifier as it appears in the transaction log.
///
/// Identifiers are kept as text. Ordering is numeric-aware: ids that parse as
/// integers sort by value and come before any non-numeric id, so `"2"` sorts
/// before `"10"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CustomerId {
    raw: String,
    numeric: Option<i64>,
}

impl CustomerId {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let numeric = raw.parse().ok();
        Self { raw, numeric }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for CustomerId {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for CustomerId {}

impl Ord for CustomerId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric, other.numeric) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.raw.cmp(&other.raw)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl PartialOrd for CustomerId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for CustomerId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for CustomerId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CustomerId> for String {
    fn from(id: CustomerId) -> Self {
        id.raw
    }
}

/// One purchase event from the transaction log
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: CustomerId,
    pub purchase_date: NaiveDateTime,
    pub purchase_code: String,
    /// Non-negative amount spent on this purchase
    pub total_value: f64,
}

/// The three per-customer metrics, in the order they appear in a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    /// Days since the customer's last purchase (lower is better)
    Recency,
    /// Number of purchases (higher is better)
    Frequency,
    /// Total amount spent (higher is better)
    Value,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Recency, Metric::Frequency, Metric::Value];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Recency => "recency",
            Metric::Frequency => "frequency",
            Metric::Value => "value",
        }
    }

    /// Column position of this metric in a feature matrix
    pub fn index(self) -> usize {
        match self {
            Metric::Recency => 0,
            Metric::Frequency => 1,
            Metric::Value => 2,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Recency, frequency and value derived for a single customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: CustomerId,
    /// Whole days between the reference date and the latest purchase
    pub recency: u64,
    /// Count of transaction records, duplicates included
    pub frequency: u64,
    /// Sum of total values
    pub value: f64,
}

impl CustomerMetrics {
    /// Metric value as a float, for quantile computation and classification
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Recency => self.recency as f64,
            Metric::Frequency => self.frequency as f64,
            Metric::Value => self.value,
        }
    }
}
