//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::data::{parse_purchase_date, ColumnMap};
use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::metrics::ReferenceDate;
use crate::pipeline::SegmentOptions;
use crate::score::ActionTable;

/// Customer segmentation CLI using quartile-based RFV scoring
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file of transactions
    #[arg(short, long, default_value = "data.csv")]
    pub input: PathBuf,

    /// Path of the segmentation table to write
    #[arg(short, long, default_value = "rfv_segmentation.csv")]
    pub output: PathBuf,

    /// Output format; inferred from the output extension when omitted
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Measure recency from this date instead of the latest purchase.
    /// A plain date means the end of that day, so purchases made on it count
    /// as 0 days old; a date with a time of day is taken as given.
    /// Example: --reference-date 2024-01-31
    #[arg(long)]
    pub reference_date: Option<String>,

    /// Add or replace a marketing action for a score, as SCORE=TEXT
    /// Example: --action "BAA=invite to loyalty club"
    #[arg(long = "action", value_name = "SCORE=TEXT")]
    pub actions: Vec<String>,

    /// Column holding the purchase date
    #[arg(long, default_value = "purchase_date")]
    pub date_column: String,

    /// Column holding the customer id
    #[arg(long, default_value = "customer_id")]
    pub customer_column: String,

    /// Column holding the purchase code
    #[arg(long, default_value = "purchase_code")]
    pub code_column: String,

    /// Column holding the purchase total value
    #[arg(long, default_value = "total_value")]
    pub value_column: String,

    /// Classification mode: provide R,F,V values as comma-separated string
    /// Example: --classify "30,10,500.0" for Recency=30, Frequency=10, Value=500.0
    #[arg(short, long)]
    pub classify: Option<String>,

    /// Number of segmented customers to print after the run
    #[arg(long, default_value = "5")]
    pub preview: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse RFV values from the classify string
    /// Expected format: "recency,frequency,value"
    pub fn parse_rfv_values(&self) -> Result<Option<(f64, f64, f64)>> {
        let Some(ref classify_str) = self.classify else {
            return Ok(None);
        };

        let invalid = |reason| Error::InvalidArgument {
            argument: "--classify",
            value: classify_str.clone(),
            reason,
        };

        let parts: Vec<&str> = classify_str.split(',').map(str::trim).collect();
        let [recency, frequency, value] = parts.as_slice() else {
            return Err(invalid("expected 'recency,frequency,value'"));
        };

        let parse = |part: &str| {
            part.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid("each value must be a finite number"))
        };

        Ok(Some((parse(*recency)?, parse(*frequency)?, parse(*value)?)))
    }

    pub fn column_map(&self) -> ColumnMap {
        ColumnMap {
            purchase_date: self.date_column.clone(),
            customer_id: self.customer_column.clone(),
            purchase_code: self.code_column.clone(),
            total_value: self.value_column.clone(),
        }
    }

    pub fn reference(&self) -> Result<ReferenceDate> {
        let Some(raw) = self.reference_date.as_deref() else {
            return Ok(ReferenceDate::Latest);
        };

        let end_of_day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_micro_opt(23, 59, 59, 999_999));

        end_of_day
            .or_else(|| parse_purchase_date(raw))
            .map(ReferenceDate::Fixed)
            .ok_or_else(|| Error::InvalidArgument {
                argument: "--reference-date",
                value: raw.to_string(),
                reason: "expected a date such as 2024-01-31",
            })
    }

    /// Seed action table with every `--action` rule applied in order
    pub fn action_table(&self) -> Result<ActionTable> {
        let mut table = ActionTable::default();
        for rule in &self.actions {
            table.insert_rule(rule)?;
        }
        Ok(table)
    }

    pub fn segment_options(&self) -> Result<SegmentOptions> {
        Ok(SegmentOptions {
            reference: self.reference()?,
            actions: self.action_table()?,
        })
    }

    pub fn export_format(&self) -> ExportFormat {
        self.format
            .unwrap_or_else(|| ExportFormat::from_path(&self.output))
    }
}
