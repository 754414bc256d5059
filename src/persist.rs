//! Artifact persistence: the three fixed-name CSV outputs.
//!
//! - `cleaned_data.csv` — the cleaned reading set.
//! - `summary_statistics.csv` — per-turbine daily min/max/mean.
//! - `anomalies.csv` — flagged readings with the justifying day mean/stddev.
//!
//! Artifacts from a prior run are overwritten. Any I/O failure is fatal and
//! surfaces with the offending path; row-level content was already validated
//! upstream, so nothing here is recoverable.

use crate::types::{AnomalyRecord, DailyStat, Reading};
use chrono::SecondsFormat;
use serde::Serialize;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

// ============================================================================
// Errors
// ============================================================================

/// Output location or write failure. Fatal, reported with the artifact path.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Artifact names
// ============================================================================

/// Cleaned data artifact file name.
pub const CLEANED_FILE: &str = "cleaned_data.csv";
/// Daily statistics artifact file name.
pub const STATS_FILE: &str = "summary_statistics.csv";
/// Anomalies artifact file name.
pub const ANOMALIES_FILE: &str = "anomalies.csv";

/// Absolute paths of the three written artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPaths {
    pub cleaned: PathBuf,
    pub stats: PathBuf,
    pub anomalies: PathBuf,
}

// ============================================================================
// Writing
// ============================================================================

/// Write all three artifacts under `out_dir`, creating it if needed.
pub fn write_artifacts(
    out_dir: &Path,
    readings: &[Reading],
    stats: &[DailyStat],
    anomalies: &[AnomalyRecord],
) -> Result<ArtifactPaths, PersistError> {
    std::fs::create_dir_all(out_dir).map_err(|e| PersistError::io(out_dir, e))?;

    let paths = ArtifactPaths {
        cleaned: out_dir.join(CLEANED_FILE),
        stats: out_dir.join(STATS_FILE),
        anomalies: out_dir.join(ANOMALIES_FILE),
    };

    write_cleaned(&paths.cleaned, readings)?;
    write_stats(&paths.stats, stats)?;
    write_anomalies(&paths.anomalies, anomalies)?;

    info!(dir = %out_dir.display(), "All artifacts written");
    Ok(paths)
}

fn write_cleaned(path: &Path, readings: &[Reading]) -> Result<(), PersistError> {
    let mut w = open(path)?;
    emit(path, &mut w, "timestamp,turbine_id,power_output,source_file")?;
    for r in readings {
        let row = format!(
            "{},{},{},{}",
            format_timestamp(r),
            csv_field(&r.turbine_id),
            r.power_output,
            csv_field(&r.source_file),
        );
        emit(path, &mut w, &row)?;
    }
    finish(path, w, readings.len())
}

fn write_stats(path: &Path, stats: &[DailyStat]) -> Result<(), PersistError> {
    let mut w = open(path)?;
    emit(path, &mut w, "turbine_id,day,min,max,mean")?;
    for s in stats {
        let row = format!(
            "{},{},{},{},{}",
            csv_field(&s.turbine_id),
            s.day,
            s.min,
            s.max,
            s.mean,
        );
        emit(path, &mut w, &row)?;
    }
    finish(path, w, stats.len())
}

fn write_anomalies(path: &Path, anomalies: &[AnomalyRecord]) -> Result<(), PersistError> {
    let mut w = open(path)?;
    emit(
        path,
        &mut w,
        "timestamp,turbine_id,power_output,source_file,day_mean,day_stddev",
    )?;
    for a in anomalies {
        let row = format!(
            "{},{},{},{},{},{}",
            a.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            csv_field(&a.turbine_id),
            a.power_output,
            csv_field(&a.source_file),
            a.day_mean,
            a.day_stddev,
        );
        emit(path, &mut w, &row)?;
    }
    finish(path, w, anomalies.len())
}

// ============================================================================
// Helpers
// ============================================================================

fn open(path: &Path) -> Result<BufWriter<File>, PersistError> {
    let file = File::create(path).map_err(|e| PersistError::io(path, e))?;
    Ok(BufWriter::new(file))
}

fn emit(path: &Path, w: &mut BufWriter<File>, line: &str) -> Result<(), PersistError> {
    writeln!(w, "{line}").map_err(|e| PersistError::io(path, e))
}

fn finish(path: &Path, mut w: BufWriter<File>, rows: usize) -> Result<(), PersistError> {
    w.flush().map_err(|e| PersistError::io(path, e))?;
    info!(path = %path.display(), rows, "Artifact written");
    Ok(())
}

fn format_timestamp(r: &Reading) -> String {
    r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Quote a field when it contains the delimiter, a quote, or a newline;
/// inner quotes are doubled. Mirror of the loader's quote-aware split.
fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: &str, turbine: &str, power: f64) -> Reading {
        Reading {
            timestamp: ts.parse().expect("test timestamp"),
            turbine_id: turbine.to_string(),
            power_output: power,
            source_file: "feed_1".to_string(),
        }
    }

    #[test]
    fn csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("T1"), "T1");
        assert_eq!(csv_field("T,1"), "\"T,1\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn artifacts_written_with_fixed_names_and_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let readings = vec![reading("2024-05-01T00:00:00Z", "T1", 2.5)];
        let stats = vec![DailyStat {
            turbine_id: "T1".to_string(),
            day: "2024-05-01".parse().expect("day"),
            min: 2.5,
            max: 2.5,
            mean: 2.5,
            stddev: 0.0,
            count: 1,
        }];

        let paths = write_artifacts(dir.path(), &readings, &stats, &[]).expect("write");

        let cleaned = std::fs::read_to_string(&paths.cleaned).expect("read cleaned");
        assert_eq!(
            cleaned,
            "timestamp,turbine_id,power_output,source_file\n\
             2024-05-01T00:00:00Z,T1,2.5,feed_1\n"
        );

        let stats_text = std::fs::read_to_string(&paths.stats).expect("read stats");
        assert_eq!(
            stats_text,
            "turbine_id,day,min,max,mean\nT1,2024-05-01,2.5,2.5,2.5\n"
        );

        let anomalies_text = std::fs::read_to_string(&paths.anomalies).expect("read anomalies");
        assert_eq!(
            anomalies_text,
            "timestamp,turbine_id,power_output,source_file,day_mean,day_stddev\n"
        );
    }

    #[test]
    fn rerun_overwrites_prior_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = vec![
            reading("2024-05-01T00:00:00Z", "T1", 1.0),
            reading("2024-05-01T00:10:00Z", "T1", 2.0),
        ];
        write_artifacts(dir.path(), &first, &[], &[]).expect("first write");

        let second = vec![reading("2024-05-02T00:00:00Z", "T2", 3.0)];
        let paths = write_artifacts(dir.path(), &second, &[], &[]).expect("second write");

        let cleaned = std::fs::read_to_string(&paths.cleaned).expect("read cleaned");
        assert_eq!(cleaned.lines().count(), 2, "header + one row");
        assert!(cleaned.contains("T2"));
        assert!(!cleaned.contains("T1"));
    }

    #[test]
    fn unwritable_output_location_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A regular file where the output directory should be.
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"occupied").expect("write blocker");

        let err = write_artifacts(&blocker, &[], &[], &[]).expect_err("must fail");
        let PersistError::Io { path, .. } = err;
        assert_eq!(path, blocker);
    }
}
