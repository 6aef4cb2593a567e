//! Aggregation of transaction records into per-customer RFV metrics

use chrono::{DateTime, NaiveDateTime};
use ndarray::Array2;
use polars::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{CustomerId, CustomerMetrics, Metric, Transaction};

/// Date against which recency is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceDate {
    /// The latest purchase date found in the transaction log
    #[default]
    Latest,
    /// A caller-supplied date; must not precede any purchase
    Fixed(NaiveDateTime),
}

impl ReferenceDate {
    /// Resolve the reference date for a set of transactions.
    pub fn resolve(self, transactions: &[Transaction]) -> Result<NaiveDateTime> {
        let latest = transactions
            .iter()
            .map(|t| t.purchase_date)
            .max()
            .ok_or(Error::EmptyInput)?;

        Ok(match self {
            ReferenceDate::Latest => latest,
            ReferenceDate::Fixed(date) => date,
        })
    }
}

/// Metrics for every customer, plus the reference date they were measured at
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub reference_date: NaiveDateTime,
    /// One row per distinct customer, ordered by customer id
    pub rows: Vec<CustomerMetrics>,
}

impl MetricsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw metric values as an `(n_customers, 3)` matrix in
    /// recency, frequency, value column order.
    pub fn feature_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), Metric::ALL.len()), |(row, col)| {
            self.rows[row].get(Metric::ALL[col])
        })
    }
}

const CUSTOMER: &str = "customer_id";
const PURCHASED_AT: &str = "purchased_at";
const TOTAL_VALUE: &str = "total_value";
const LAST_PURCHASE: &str = "last_purchase";
const FREQUENCY: &str = "frequency";
const VALUE: &str = "value";

/// Transactions as a table, with purchase dates as microsecond timestamps
fn transaction_frame(transactions: &[Transaction]) -> Result<DataFrame> {
    let df = df![
        CUSTOMER => transactions.iter().map(|t| t.customer_id.as_str()).collect::<Vec<_>>(),
        PURCHASED_AT => transactions
            .iter()
            .map(|t| t.purchase_date.and_utc().timestamp_micros())
            .collect::<Vec<i64>>(),
        TOTAL_VALUE => transactions.iter().map(|t| t.total_value).collect::<Vec<f64>>(),
    ]?;
    Ok(df)
}

fn from_micros(micros: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros)
        .map(|date| date.naive_utc())
        .ok_or_else(|| PolarsError::ComputeError("purchase timestamp out of range".into()).into())
}

/// Derive recency, frequency and value for each customer.
///
/// Transactions are grouped by customer id: the latest purchase date, the
/// record count and the summed total value per group. Frequency counts every
/// record, including repeated purchase codes.
pub fn aggregate(transactions: &[Transaction], reference: ReferenceDate) -> Result<MetricsTable> {
    let reference_date = reference.resolve(transactions)?;

    let grouped = transaction_frame(transactions)?
        .lazy()
        .group_by([col(CUSTOMER)])
        .agg([
            col(PURCHASED_AT).max().alias(LAST_PURCHASE),
            col(PURCHASED_AT).count().alias(FREQUENCY),
            col(TOTAL_VALUE).sum().alias(VALUE),
        ])
        .collect()?;

    let frequency = grouped.column(FREQUENCY)?.cast(&DataType::UInt64)?;

    let mut rows = grouped
        .column(CUSTOMER)?
        .str()?
        .into_no_null_iter()
        .zip(grouped.column(LAST_PURCHASE)?.i64()?.into_no_null_iter())
        .zip(frequency.u64()?.into_no_null_iter())
        .zip(grouped.column(VALUE)?.f64()?.into_no_null_iter())
        .map(|(((customer_id, last_purchase), frequency), value)| {
            let last_purchase = from_micros(last_purchase)?;
            if reference_date < last_purchase {
                return Err(Error::ReferenceDateTooEarly {
                    reference: reference_date,
                    customer_id: customer_id.to_string(),
                    last_purchase,
                });
            }

            Ok(CustomerMetrics {
                customer_id: CustomerId::new(customer_id),
                recency: (reference_date - last_purchase).num_days().unsigned_abs(),
                frequency,
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // group order is unspecified
    rows.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    debug!(
        transactions = transactions.len(),
        customers = rows.len(),
        reference_date = %reference_date,
        "aggregated customer metrics"
    );

    Ok(MetricsTable {
        reference_date,
        rows,
    })
}
