//! windfarm-pipeline — batch processing for wind-turbine telemetry CSV feeds.
//!
//! Runs the full load → clean → stats → anomaly → persist pipeline once and
//! exits. Exit status is 0 iff all three artifacts were written.
//!
//! # Usage
//!
//! ```bash
//! # Process every *.csv in the configured input directory (default: data/)
//! windfarm-pipeline
//!
//! # Explicit feeds, custom output directory
//! windfarm-pipeline feeds/2024-05-01.csv feeds/2024-05-02.csv --output artifacts/
//!
//! # Machine-readable run report
//! windfarm-pipeline data/ --report-json run_report.json
//! ```
//!
//! # Environment Variables
//!
//! - `WINDFARM_CONFIG`: Path to a pipeline_config.toml (overridden by --config)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use windfarm_pipeline::config::PipelineConfig;
use windfarm_pipeline::pipeline;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "windfarm-pipeline")]
#[command(about = "Clean turbine telemetry feeds, compute daily statistics, flag anomalies")]
#[command(version)]
struct CliArgs {
    /// Input CSV files and/or directories. Directories expand to their *.csv
    /// entries sorted by name. Defaults to the configured input directory.
    inputs: Vec<PathBuf>,

    /// Override the output directory (default from config: "output")
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Explicit config file path, bypassing the WINDFARM_CONFIG /
    /// pipeline_config.toml search order
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the run summary as pretty JSON to this path
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::load(),
    };
    if let Some(output) = args.output {
        config.output.dir = output;
    }

    let summary = pipeline::run(&config, &args.inputs).context("pipeline run failed")?;

    print_summary(&summary);

    if let Some(path) = args.report_json {
        let json = serde_json::to_string_pretty(&summary).context("serializing run report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!(path = %path.display(), "Run report written");
    }

    Ok(())
}

fn print_summary(summary: &pipeline::RunSummary) {
    let c = &summary.cleaning;
    println!("=== Pipeline run complete ===");
    println!("  Files:      {}", summary.files_loaded);
    println!(
        "  Rows:       {} raw -> {} cleaned",
        summary.raw_rows, c.output_rows
    );
    println!(
        "  Removed:    {} duplicates, {} unparseable, {} unimputable, {} outliers",
        c.duplicates,
        c.bad_timestamps + c.missing_turbine_id + c.bad_power_values,
        c.unimputable,
        c.outliers
    );
    println!("  Imputed:    {}", c.imputed);
    println!("  Stats:      {} (turbine, day) groups", summary.stat_rows);
    println!("  Anomalies:  {}", summary.anomaly_rows);
    println!(
        "  Artifacts:  {}",
        summary
            .artifacts
            .cleaned
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .display()
    );
}
