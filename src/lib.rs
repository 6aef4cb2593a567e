//! RfvForge: A Rust CLI application for customer segmentation using RFV quartile scoring
//!
//! This library derives Recency, Frequency and Value (RFV) metrics per
//! customer from a transaction log, splits each metric into quartile classes
//! `A`-`D`, combines the classes into a three-letter score and maps selected
//! scores to marketing actions.

pub mod classify;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod quantile;
pub mod score;

// Re-export public items for easier access
pub use classify::{classify, freq_value_class, recency_class, SegmentClass};
pub use cli::Args;
pub use data::{load_transactions, parse_purchase_date, ColumnMap};
pub use error::{Error, Result};
pub use export::{export, import, ExportFormat};
pub use metrics::{aggregate, MetricsTable, ReferenceDate};
pub use model::{CustomerId, CustomerMetrics, Metric, Transaction};
pub use pipeline::{segment, validate, SegmentOptions, SegmentSummary, SegmentedCustomer, Segmentation};
pub use quantile::{QuartileBoundaries, Quartiles};
pub use score::{ActionTable, RfvScore};
