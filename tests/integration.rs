//! Integration tests for RfvForge

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use rfvforge::{
    export, import, load_transactions, segment, ColumnMap, CustomerId, Error, ExportFormat,
    ReferenceDate, SegmentOptions, Transaction,
};
use tempfile::{NamedTempFile, TempDir};

const HEADER: &str = "purchase_date,customer_id,purchase_code,total_value";

/// Create a test CSV file with sample data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();

    // Customer 17850 - frequent, recent, high value
    writeln!(file, "2011-12-01,17850,536365,120.50").unwrap();
    writeln!(file, "2011-12-05,17850,536366,80.25").unwrap();
    writeln!(file, "2011-12-08,17850,536367,300.00").unwrap();
    writeln!(file, "2011-12-09,17850,536368,210.00").unwrap();

    // Customer 12345 - recent, moderate
    writeln!(file, "2011-12-02,12345,536370,150.00").unwrap();
    writeln!(file, "2011-12-07,12345,536371,100.00").unwrap();
    writeln!(file, "2011-12-07,12345,536371,100.00").unwrap();

    // Customer 13047 - older, two purchases
    writeln!(file, "2011-10-15,13047,536380,60.00").unwrap();
    writeln!(file, "2011-11-01,13047,536381,40.00").unwrap();

    // Customer 98765 - old low value
    writeln!(file, "2010-12-01,98765,536390,15.00").unwrap();

    file
}

fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();

    let transactions = load_transactions(test_file.path(), &ColumnMap::default()).unwrap();
    assert_eq!(transactions.len(), 10);

    let segmentation = segment(&transactions, &SegmentOptions::default()).unwrap();

    assert_eq!(segmentation.reference_date, day(2011, 12, 9));
    assert_eq!(segmentation.len(), 4);

    let ids: Vec<&str> = segmentation
        .customers
        .iter()
        .map(|c| c.customer_id.as_str())
        .collect();
    assert_eq!(ids, vec!["12345", "13047", "17850", "98765"]);

    let by_id: BTreeMap<&str, _> = segmentation
        .customers
        .iter()
        .map(|c| (c.customer_id.as_str(), c))
        .collect();

    let best = by_id["17850"];
    assert_eq!((best.recency, best.frequency, best.value), (0, 4, 710.75));
    assert_eq!(best.composite_score.to_string(), "AAA");
    assert_eq!(best.recommended_action.as_deref(), Some("send discount coupons"));

    let moderate = by_id["12345"];
    assert_eq!((moderate.recency, moderate.frequency, moderate.value), (2, 3, 350.0));
    assert_eq!(moderate.composite_score.to_string(), "BBB");
    assert_eq!(moderate.recommended_action, None);

    let older = by_id["13047"];
    assert_eq!((older.recency, older.frequency, older.value), (38, 2, 100.0));
    assert_eq!(older.composite_score.to_string(), "CCC");

    let lapsed = by_id["98765"];
    assert_eq!((lapsed.recency, lapsed.frequency, lapsed.value), (373, 1, 15.0));
    assert_eq!(lapsed.composite_score.to_string(), "DDD");
    assert_eq!(lapsed.recommended_action.as_deref(), Some("churn — no action"));
}

#[test]
fn test_reference_example() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    writeln!(file, "2024-01-01,1,P1,100").unwrap();
    writeln!(file, "2024-01-10,1,P2,50").unwrap();
    writeln!(file, "2024-01-05,2,P3,200").unwrap();

    let transactions = load_transactions(file.path(), &ColumnMap::default()).unwrap();
    let segmentation = segment(&transactions, &SegmentOptions::default()).unwrap();

    assert_eq!(segmentation.reference_date, day(2024, 1, 10));
    let first = &segmentation.customers[0];
    let second = &segmentation.customers[1];
    assert_eq!((first.recency, first.frequency, first.value), (0, 2, 150.0));
    assert_eq!((second.recency, second.frequency, second.value), (5, 1, 200.0));
}

#[test]
fn test_single_customer() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    writeln!(file, "2024-03-01,solo,P1,42.0").unwrap();

    let transactions = load_transactions(file.path(), &ColumnMap::default()).unwrap();
    let segmentation = segment(&transactions, &SegmentOptions::default()).unwrap();

    let quartiles = segmentation.boundaries.value;
    assert_eq!(quartiles.thresholds(), [42.0, 42.0, 42.0]);
    assert_eq!(segmentation.customers[0].composite_score.to_string(), "ADD");
}

#[test]
fn test_fixed_reference_date() {
    let test_file = create_test_csv();
    let transactions = load_transactions(test_file.path(), &ColumnMap::default()).unwrap();

    let options = SegmentOptions {
        reference: ReferenceDate::Fixed(day(2011, 12, 31)),
        ..SegmentOptions::default()
    };
    let segmentation = segment(&transactions, &options).unwrap();
    let recency: Vec<u64> = segmentation.customers.iter().map(|c| c.recency).collect();
    assert_eq!(recency, vec![24, 60, 22, 395]);

    let options = SegmentOptions {
        reference: ReferenceDate::Fixed(day(2011, 12, 1)),
        ..SegmentOptions::default()
    };
    let err = segment(&transactions, &options).unwrap_err();
    assert!(matches!(err, Error::ReferenceDateTooEarly { .. }));
}

#[test]
fn test_error_handling() {
    // Missing required column fails before any row is parsed
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "purchase_date,customer_id,total_value").unwrap();
    writeln!(file, "not-a-date,1,10").unwrap();
    let err = load_transactions(file.path(), &ColumnMap::default()).unwrap_err();
    assert!(matches!(err, Error::MissingColumns { ref missing } if missing == &["purchase_code"]));

    // Header without rows
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    let err = load_transactions(file.path(), &ColumnMap::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));

    // Empty transaction slice
    let err = segment(&[], &SegmentOptions::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyInput));

    // Transactions built in code are checked like loaded ones
    let mut transactions = load_transactions(create_test_csv().path(), &ColumnMap::default()).unwrap();
    transactions[4].total_value = -1.0;
    let err = segment(&transactions, &SegmentOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NegativeValue { line: 5, .. }));
}

#[test]
fn test_export_roundtrip() {
    let test_file = create_test_csv();
    let transactions = load_transactions(test_file.path(), &ColumnMap::default()).unwrap();
    let segmentation = segment(&transactions, &SegmentOptions::default()).unwrap();
    let dir = TempDir::new().unwrap();

    for (name, format) in [
        ("out.csv", ExportFormat::Csv),
        ("out.json", ExportFormat::Json),
        ("out.xlsx", ExportFormat::Xlsx),
    ] {
        let path = dir.path().join(name);
        export(&segmentation.customers, &path, format).unwrap();

        let restored = import(&path, format).unwrap();
        assert_eq!(restored, segmentation.customers, "{name} should round-trip");
    }
}

fn arb_transactions() -> impl Strategy<Value = Vec<Transaction>> {
    // quarter units keep every partial sum exact, whatever the summation order
    prop::collection::vec((0u8..8, 0i64..400, 0u32..40_000), 1..60).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (customer, offset, quarters))| Transaction {
                customer_id: CustomerId::new(customer.to_string()),
                purchase_date: day(2023, 1, 1) + Duration::days(offset),
                purchase_code: format!("P{i}"),
                total_value: f64::from(quarters) / 4.0,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_metrics_match_transactions(transactions in arb_transactions()) {
        let segmentation = segment(&transactions, &SegmentOptions::default()).unwrap();
        let reference = transactions.iter().map(|t| t.purchase_date).max().unwrap();
        prop_assert_eq!(segmentation.reference_date, reference);

        for customer in &segmentation.customers {
            let own: Vec<&Transaction> = transactions
                .iter()
                .filter(|t| t.customer_id == customer.customer_id)
                .collect();
            let last = own.iter().map(|t| t.purchase_date).max().unwrap();
            let total: f64 = own.iter().map(|t| t.total_value).sum();

            prop_assert_eq!(customer.recency as i64, (reference - last).num_days());
            prop_assert_eq!(customer.frequency as usize, own.len());
            prop_assert_eq!(customer.value, total);
        }
    }

    #[test]
    fn prop_scores_are_well_formed(transactions in arb_transactions()) {
        let segmentation = segment(&transactions, &SegmentOptions::default()).unwrap();

        for customer in &segmentation.customers {
            let score = customer.composite_score.to_string();
            prop_assert_eq!(score.len(), 3);
            prop_assert!(score.chars().all(|c| ('A'..='D').contains(&c)));
            let classes = format!("{}{}{}", customer.r_class, customer.f_class, customer.v_class);
            prop_assert_eq!(score, classes);
        }

        for metric in rfvforge::Metric::ALL {
            let [q25, q50, q75] = segmentation.boundaries.get(metric).thresholds();
            prop_assert!(q25 <= q50 && q50 <= q75);
        }
    }
}
