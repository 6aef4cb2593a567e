//! RfvForge: Customer segmentation CLI using quartile-based RFV scoring
//!
//! This is the main entrypoint that orchestrates data loading, segmentation,
//! export, and ad-hoc classification.

use std::env;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rfvforge::{export, load_transactions, segment, Args, Metric, Segmentation};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    // Check if in classification mode
    if let Some(rfv_values) = args.parse_rfv_values()? {
        run_classification_mode(&args, rfv_values)?;
    } else {
        run_full_pipeline(&args)?;
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RFVFORGE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "rfvforge=debug,info"
        } else {
            "rfvforge=info,warn"
        })
    });

    let format = env::var("RFVFORGE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Load the input and segment it, failing with file context on error
fn load_and_segment(args: &Args) -> Result<Segmentation> {
    let options = args.segment_options()?;

    let transactions = load_transactions(&args.input, &args.column_map())
        .with_context(|| format!("loading transactions from {}", args.input.display()))?;
    info!(transactions = transactions.len(), "loaded transactions");

    let segmentation = segment(&transactions, &options)
        .with_context(|| format!("segmenting customers from {}", args.input.display()))?;
    Ok(segmentation)
}

/// Run classification mode for a single hypothetical customer
fn run_classification_mode(args: &Args, rfv_values: (f64, f64, f64)) -> Result<()> {
    let (recency, frequency, value) = rfv_values;
    println!("=== Classification Mode ===");
    println!("Input RFV values: R={recency}, F={frequency}, V={value}");

    let start_time = Instant::now();
    let segmentation = load_and_segment(args)?;
    let (score, action) = segmentation.classify_point(recency, frequency, value);
    let elapsed = start_time.elapsed();

    println!("\n✓ RFV score: {score}");
    println!("  Recommended action: {}", action.unwrap_or("none"));
    println!("  Processing time: {:.2}s", elapsed.as_secs_f64());

    let peers = segmentation
        .customers
        .iter()
        .filter(|c| c.composite_score == score)
        .count();
    println!(
        "\nCustomers sharing score {score}: {peers} of {}",
        segmentation.len()
    );

    Ok(())
}

/// Run full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== RFV Segmentation Pipeline ===\n");

    let start_time = Instant::now();
    let segmentation = load_and_segment(args)?;
    println!("✓ Segmented {} customers", segmentation.len());
    println!("  Reference date: {}", segmentation.reference_date);

    println!("\n=== Quartile Boundaries ===");
    for metric in Metric::ALL {
        let [q25, q50, q75] = segmentation.boundaries.get(metric).thresholds();
        println!("{metric:<10} Q25={q25:.2}  Q50={q50:.2}  Q75={q75:.2}");
    }

    if args.preview > 0 {
        println!("\n=== Preview ===");
        println!(
            "{:<14} {:>8} {:>9} {:>12}  {:<5} action",
            "customer_id", "recency", "frequency", "value", "score"
        );
        for customer in segmentation.customers.iter().take(args.preview) {
            println!(
                "{:<14} {:>8} {:>9} {:>12.2}  {:<5} {}",
                customer.customer_id.as_str(),
                customer.recency,
                customer.frequency,
                customer.value,
                customer.composite_score.to_string(),
                customer.recommended_action.as_deref().unwrap_or("-")
            );
        }
    }

    let summary = segmentation.summary();
    println!("\n=== Segment Statistics ===");
    for (score, &count) in &summary.by_score {
        let percentage = (count as f64 / segmentation.len() as f64) * 100.0;
        println!("{score}: {count} customers ({percentage:.1}%)");
    }
    for (action, count) in &summary.by_action {
        println!("Action '{action}': {count} customers");
    }
    println!("No action: {} customers", summary.without_action);

    let format = args.export_format();
    export(&segmentation.customers, &args.output, format)
        .with_context(|| format!("writing segmentation to {}", args.output.display()))?;

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());
    println!("Segmentation saved to: {} ({format:?})", args.output.display());

    Ok(())
}
