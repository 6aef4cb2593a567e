//! Quartile classification of metric values into letter classes
//!
//! Recency and frequency/value are classified by two separate rules because
//! their orderings are opposite: a low recency is good, while a high
//! frequency or value is good. Class `A` is always the best quartile.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Metric;
use crate::quantile::{QuartileBoundaries, Quartiles};

/// Quartile class of a single metric, `A` being the best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SegmentClass {
    A,
    B,
    C,
    D,
}

impl SegmentClass {
    pub const ALL: [SegmentClass; 4] = [
        SegmentClass::A,
        SegmentClass::B,
        SegmentClass::C,
        SegmentClass::D,
    ];

    pub fn as_char(self) -> char {
        match self {
            SegmentClass::A => 'A',
            SegmentClass::B => 'B',
            SegmentClass::C => 'C',
            SegmentClass::D => 'D',
        }
    }

    /// Parse an upper-case class letter
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(SegmentClass::A),
            'B' => Some(SegmentClass::B),
            'C' => Some(SegmentClass::C),
            'D' => Some(SegmentClass::D),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Classify a recency value: the fewer days since the last purchase, the
/// better the class.
///
/// Thresholds are inclusive, so a value equal to Q25 is still `A`.
pub fn recency_class(value: f64, quartiles: &Quartiles) -> SegmentClass {
    if value <= quartiles.q25 {
        SegmentClass::A
    } else if value <= quartiles.q50 {
        SegmentClass::B
    } else if value <= quartiles.q75 {
        SegmentClass::C
    } else {
        SegmentClass::D
    }
}

/// Classify a frequency or value figure: the larger, the better the class.
///
/// Thresholds are inclusive, so a value equal to Q25 is still `D`.
pub fn freq_value_class(value: f64, quartiles: &Quartiles) -> SegmentClass {
    if value <= quartiles.q25 {
        SegmentClass::D
    } else if value <= quartiles.q50 {
        SegmentClass::C
    } else if value <= quartiles.q75 {
        SegmentClass::B
    } else {
        SegmentClass::A
    }
}

/// Classify `value` with the rule that belongs to `metric`.
pub fn classify(metric: Metric, value: f64, boundaries: &QuartileBoundaries) -> SegmentClass {
    let quartiles = boundaries.get(metric);
    match metric {
        Metric::Recency => recency_class(value, quartiles),
        Metric::Frequency | Metric::Value => freq_value_class(value, quartiles),
    }
}
