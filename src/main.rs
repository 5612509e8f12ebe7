//! creditlens: credit applicant profiling and segmentation CLI
//!
//! This is the main entrypoint that orchestrates data loading, the
//! preparation/segmentation pipeline, reporting, and prediction.

use anyhow::{Context, Result};
use clap::Parser;
use creditlens::{load_credit_table, pipeline, viz, Args, PipelineOutput};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; `RUST_LOG` takes precedence over
/// `--log-level`.
fn init_logging(level: &str, verbose: bool) {
    let effective_level = if verbose { "info" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.verbose);
    let applicant = args.parse_applicant_values()?;

    if args.verbose {
        println!("creditlens - Credit Applicant Segmentation using K-Means");
        println!("========================================================\n");
    }

    let start_time = Instant::now();

    if args.verbose {
        println!("Loading applicant records from: {}", args.input);
    }
    let table = load_credit_table(&args.input, args.load_options())?;
    println!("✓ Data loaded: {} applicants", table.height());

    let config = args.pipeline_config();
    if args.verbose {
        println!("\nRunning pipeline");
        println!("  Categorical columns: {}", config.categorical.join(", "));
        println!("  Features: {}", config.features.join(", "));
        println!("  Number of clusters: {}", config.n_clusters);
        println!("  Seed: {}", config.seed);
        println!("  Max iterations: {}", config.max_iterations);
    }

    let output = pipeline::run(&table, &config).context("pipeline failed")?;
    println!(
        "✓ Segmentation complete ({} iterations{})",
        output.model.n_iterations,
        if output.model.converged {
            ""
        } else {
            ", iteration limit reached"
        }
    );

    if let Some(values) = applicant {
        run_prediction_mode(&output, &values)?;
    } else {
        run_report(&args, &output)?;
    }

    println!("\nTotal processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Predict the cluster of a single applicant
fn run_prediction_mode(output: &PipelineOutput, values: &[f64]) -> Result<()> {
    println!("\n=== Prediction Mode ===");
    let described: Vec<String> = output
        .scaled
        .names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    println!("Input: {}", described.join(", "));

    let cluster = output.predict(values)?;
    println!("\n✓ Predicted Cluster: {}", cluster);

    let cluster_sizes = output.model.cluster_sizes();
    let total = output.table.height();
    let percentage = (cluster_sizes[cluster] as f64 / total as f64) * 100.0;
    println!("\nCluster {} details:", cluster);
    println!(
        "  Size: {} applicants ({:.1}% of total)",
        cluster_sizes[cluster], percentage
    );

    let centroid = output.raw_centroids()?;
    let centroid: Vec<String> = output
        .scaled
        .names
        .iter()
        .zip(centroid.row(cluster).iter())
        .map(|(name, value)| format!("{}={:.1}", name, value))
        .collect();
    println!("  Centroid: {}", centroid.join(", "));

    Ok(())
}

/// Print the analysis report and render the charts
fn run_report(args: &Args, output: &PipelineOutput) -> Result<()> {
    viz::print_report(output)?;

    if args.no_charts {
        return Ok(());
    }

    let viz_start = Instant::now();
    let written = viz::generate_visualization_report(output, Path::new(&args.output_dir))?;
    println!("\n✓ {} charts written to {}", written.len(), args.output_dir);
    if args.verbose {
        for path in &written {
            println!("  {}", path.display());
        }
        println!(
            "  Visualization time: {:.2}s",
            viz_start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}
