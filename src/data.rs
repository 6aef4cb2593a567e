//! Loading transaction records from CSV using Polars

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{CustomerId, Transaction};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Names of the input columns holding each transaction field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub purchase_date: String,
    pub customer_id: String,
    pub purchase_code: String,
    pub total_value: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            purchase_date: "purchase_date".to_string(),
            customer_id: "customer_id".to_string(),
            purchase_code: "purchase_code".to_string(),
            total_value: "total_value".to_string(),
        }
    }
}

impl ColumnMap {
    fn required(&self) -> [&str; 4] {
        [
            self.purchase_date.as_str(),
            self.customer_id.as_str(),
            self.purchase_code.as_str(),
            self.total_value.as_str(),
        ]
    }
}

/// Read a transaction log from a CSV file with a header row.
///
/// Every column is read as text and parsed here, so that errors can point at
/// the offending line. Line numbers count the header as line 1.
pub fn load_transactions(path: impl AsRef<Path>, columns: &ColumnMap) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let df = read_text_table(path)?;

    debug!(path = %path.display(), rows = df.height(), "read transaction table");
    transactions_from_frame(&df, columns)
}

/// Read a CSV file with a header row, keeping every column as text.
pub(crate) fn read_text_table(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;

    match CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()
    {
        Ok(df) => Ok(df),
        Err(PolarsError::NoData(_)) => Err(Error::EmptyInput),
        Err(e) => Err(e.into()),
    }
}

/// Fail with [`Error::MissingColumns`] unless `df` has every named column.
pub(crate) fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingColumns { missing })
    }
}

/// Column `name` cast to text.
pub(crate) fn text_column(df: &DataFrame, name: &str) -> Result<Series> {
    Ok(df.column(name)?.cast(&DataType::String)?)
}

/// Convert a table of text columns into typed transactions.
///
/// Fails when a required column is absent (before any row is looked at), when
/// the table has no rows, or when any field is empty or unparseable.
pub fn transactions_from_frame(df: &DataFrame, columns: &ColumnMap) -> Result<Vec<Transaction>> {
    require_columns(df, &columns.required())?;

    if df.height() == 0 {
        return Err(Error::EmptyInput);
    }

    let dates = text_column(df, &columns.purchase_date)?;
    let customers = text_column(df, &columns.customer_id)?;
    let codes = text_column(df, &columns.purchase_code)?;
    let values = text_column(df, &columns.total_value)?;

    let (dates, customers, codes, values) = (
        dates.str()?,
        customers.str()?,
        codes.str()?,
        values.str()?,
    );

    (0..df.height())
        .map(|row| {
            let line = row + 2;

            let raw_date = required_field(dates, row, &columns.purchase_date)?;
            let purchase_date = parse_purchase_date(raw_date).ok_or_else(|| Error::Parse {
                line,
                column: columns.purchase_date.clone(),
                value: raw_date.to_string(),
                expected: "a date",
            })?;

            let raw_value = required_field(values, row, &columns.total_value)?;
            let total_value = parse_total_value(raw_value).ok_or_else(|| Error::Parse {
                line,
                column: columns.total_value.clone(),
                value: raw_value.to_string(),
                expected: "a number",
            })?;
            if total_value < 0.0 {
                return Err(Error::NegativeValue {
                    line,
                    value: total_value,
                });
            }

            Ok(Transaction {
                customer_id: CustomerId::new(required_field(customers, row, &columns.customer_id)?),
                purchase_date,
                purchase_code: required_field(codes, row, &columns.purchase_code)?.to_string(),
                total_value,
            })
        })
        .collect()
}

/// Trimmed, non-empty text of `column` at `row`.
fn required_field<'a>(values: &'a StringChunked, row: usize, column: &str) -> Result<&'a str> {
    values
        .get(row)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MissingField {
            line: row + 2,
            column: column.to_string(),
        })
}

/// Parse a purchase date given as a plain date, a naive date-time or an
/// RFC 3339 timestamp. Plain dates are taken at midnight.
pub fn parse_purchase_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Some(datetime) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(datetime);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|datetime| datetime.naive_utc())
}

fn parse_total_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
