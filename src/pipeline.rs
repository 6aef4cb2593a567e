//! End-to-end segmentation: aggregate, compute quartiles, classify, score

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{classify, SegmentClass};
use crate::error::{Error, Result};
use crate::metrics::{aggregate, ReferenceDate};
use crate::model::{CustomerId, CustomerMetrics, Metric, Transaction};
use crate::quantile::QuartileBoundaries;
use crate::score::{ActionTable, RfvScore};

/// Settings for a segmentation run
#[derive(Debug, Clone, Default)]
pub struct SegmentOptions {
    pub reference: ReferenceDate,
    pub actions: ActionTable,
}

/// One row of the segmentation output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedCustomer {
    pub customer_id: CustomerId,
    pub recency: u64,
    pub frequency: u64,
    pub value: f64,
    pub r_class: SegmentClass,
    pub f_class: SegmentClass,
    pub v_class: SegmentClass,
    pub composite_score: RfvScore,
    pub recommended_action: Option<String>,
}

/// Result of a segmentation run
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub reference_date: NaiveDateTime,
    pub boundaries: QuartileBoundaries,
    /// Ordered by customer id
    pub customers: Vec<SegmentedCustomer>,
    actions: ActionTable,
}

/// Customer counts per composite score and per recommended action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentSummary {
    pub by_score: BTreeMap<RfvScore, usize>,
    pub by_action: BTreeMap<String, usize>,
    pub without_action: usize,
}

/// Segment every customer found in `transactions`.
///
/// All customers are aggregated and the quartile boundaries computed before
/// any customer is classified. Any failure aborts the whole run.
pub fn segment(transactions: &[Transaction], options: &SegmentOptions) -> Result<Segmentation> {
    validate(transactions)?;

    let table = aggregate(transactions, options.reference)?;
    let boundaries = QuartileBoundaries::compute(&table)?;
    debug!(?boundaries, "computed quartile boundaries");

    let customers: Vec<SegmentedCustomer> = table
        .rows
        .into_iter()
        .map(|row| classify_customer(row, &boundaries, &options.actions))
        .collect();

    info!(
        customers = customers.len(),
        reference_date = %table.reference_date,
        "segmentation complete"
    );

    Ok(Segmentation {
        reference_date: table.reference_date,
        boundaries,
        customers,
        actions: options.actions.clone(),
    })
}

/// Check that there is at least one transaction and that every total value
/// is a finite, non-negative number.
///
/// Errors carry the 1-based position of the offending record as `line`.
pub fn validate(transactions: &[Transaction]) -> Result<()> {
    if transactions.is_empty() {
        return Err(Error::EmptyInput);
    }

    for (index, transaction) in transactions.iter().enumerate() {
        let line = index + 1;
        let value = transaction.total_value;

        if !value.is_finite() {
            return Err(Error::Parse {
                line,
                column: "total_value".to_string(),
                value: value.to_string(),
                expected: "a finite number",
            });
        }
        if value < 0.0 {
            return Err(Error::NegativeValue { line, value });
        }
    }

    Ok(())
}

fn score_metrics(
    recency: f64,
    frequency: f64,
    value: f64,
    boundaries: &QuartileBoundaries,
) -> RfvScore {
    RfvScore::new(
        classify(Metric::Recency, recency, boundaries),
        classify(Metric::Frequency, frequency, boundaries),
        classify(Metric::Value, value, boundaries),
    )
}

fn classify_customer(
    row: CustomerMetrics,
    boundaries: &QuartileBoundaries,
    actions: &ActionTable,
) -> SegmentedCustomer {
    let score = score_metrics(
        row.get(Metric::Recency),
        row.get(Metric::Frequency),
        row.get(Metric::Value),
        boundaries,
    );

    SegmentedCustomer {
        customer_id: row.customer_id,
        recency: row.recency,
        frequency: row.frequency,
        value: row.value,
        r_class: score.recency,
        f_class: score.frequency,
        v_class: score.value,
        composite_score: score,
        recommended_action: actions.lookup(&score).map(str::to_string),
    }
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Score a hypothetical customer against this run's boundaries and
    /// action table.
    pub fn classify_point(
        &self,
        recency: f64,
        frequency: f64,
        value: f64,
    ) -> (RfvScore, Option<&str>) {
        let score = score_metrics(recency, frequency, value, &self.boundaries);
        (score, self.actions.lookup(&score))
    }

    pub fn summary(&self) -> SegmentSummary {
        let mut summary = SegmentSummary::default();
        for customer in &self.customers {
            *summary.by_score.entry(customer.composite_score).or_default() += 1;
            match &customer.recommended_action {
                Some(action) => *summary.by_action.entry(action.clone()).or_default() += 1,
                None => summary.without_action += 1,
            }
        }
        summary
    }
}
