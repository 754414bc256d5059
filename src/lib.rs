//! Wind-farm turbine telemetry batch pipeline.
//!
//! Ingests raw per-turbine sensor CSV feeds, cleans and validates them,
//! computes per-turbine daily statistics, flags statistically anomalous
//! readings, and persists three CSV artifacts.
//!
//! ## Pipeline
//!
//! - **Loader** (`ingest`): concatenates CSV feeds sharing the
//!   `timestamp,turbine_id,power_output` schema
//! - **Cleaner** (`clean`): dedup, UTC normalization, per-turbine median
//!   imputation, percentile outlier fences
//! - **Statistics Engine** (`stats`): per-turbine daily min/max/mean
//! - **Anomaly Detector** (`anomaly`): 2σ deviation flagging with a
//!   zero-variance guard
//! - **Persister** (`persist`): `cleaned_data.csv`, `summary_statistics.csv`,
//!   `anomalies.csv`

pub mod anomaly;
pub mod clean;
pub mod config;
pub mod ingest;
pub mod persist;
pub mod pipeline;
pub mod stats;
pub mod types;

// Re-export the pipeline surface
pub use pipeline::{run, PipelineError, RunSummary};

// Re-export configuration
pub use config::PipelineConfig;

// Re-export commonly used types
pub use types::{AnomalyRecord, DailyStat, RawRecord, Reading};

// Re-export stage entry points
pub use anomaly::detect_anomalies;
pub use clean::{clean as clean_readings, CleaningReport};
pub use ingest::{load_inputs, IngestError};
pub use persist::{write_artifacts, ArtifactPaths, PersistError};
pub use stats::compute_daily_stats;
