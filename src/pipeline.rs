//! End-to-end pipeline orchestration.
//!
//! Wires the five stages — load → clean → stats → anomaly → persist — in
//! their fixed linear order and reports what happened through [`RunSummary`].
//! Each stage consumes the immutable output of the previous one; there is
//! no shared state and no retry logic anywhere in the run.

use crate::anomaly::detect_anomalies;
use crate::clean::{clean, CleaningReport};
use crate::config::PipelineConfig;
use crate::ingest::{load_inputs, IngestError};
use crate::persist::{write_artifacts, ArtifactPaths, PersistError};
use crate::stats::compute_daily_stats;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

// ============================================================================
// Errors
// ============================================================================

/// Fatal pipeline failures. Row-level problems never land here — they are
/// recovered by exclusion and accounted in the [`CleaningReport`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("no input rows loaded from {files} file(s)")]
    NoInput { files: usize },
}

// ============================================================================
// Run Summary
// ============================================================================

/// Everything a caller needs to know about a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Number of input files read.
    pub files_loaded: usize,
    /// Raw rows before cleaning.
    pub raw_rows: usize,
    /// Cleaning stage accounting.
    pub cleaning: CleaningReport,
    /// `(turbine, day)` groups in the statistics artifact.
    pub stat_rows: usize,
    /// Flagged readings in the anomalies artifact.
    pub anomaly_rows: usize,
    /// Where the three artifacts were written.
    pub artifacts: ArtifactPaths,
}

// ============================================================================
// Run
// ============================================================================

/// Execute one full pipeline pass.
///
/// `inputs` may name files and/or directories; when empty, the configured
/// input directory is scanned instead. All three artifacts are written to
/// the configured output directory, overwriting prior runs.
pub fn run(cfg: &PipelineConfig, inputs: &[PathBuf]) -> Result<RunSummary, PipelineError> {
    let resolved: Vec<PathBuf> = if inputs.is_empty() {
        vec![cfg.input.dir.clone()]
    } else {
        inputs.to_vec()
    };

    info!(inputs = resolved.len(), "Loading raw feeds");
    let batch = load_inputs(&resolved)?;
    if batch.records.is_empty() {
        return Err(PipelineError::NoInput { files: batch.files });
    }
    let raw_rows = batch.records.len();

    info!("Cleaning data");
    let (readings, cleaning) = clean(batch.records, &cfg.cleaning);

    info!("Computing daily statistics");
    let stats = compute_daily_stats(&readings);

    info!("Detecting anomalies");
    let anomalies = detect_anomalies(&readings, &stats, &cfg.anomaly);

    info!(dir = %cfg.output.dir.display(), "Persisting artifacts");
    let artifacts = write_artifacts(&cfg.output.dir, &readings, &stats, &anomalies)?;

    Ok(RunSummary {
        files_loaded: batch.files,
        raw_rows,
        cleaning,
        stat_rows: stats.len(),
        anomaly_rows: anomalies.len(),
        artifacts,
    })
}
