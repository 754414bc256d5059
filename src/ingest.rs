//! Raw CSV feed loader.
//!
//! Reads one or more turbine telemetry CSV files sharing the
//! `timestamp,turbine_id,power_output` schema and concatenates them into a
//! single ordered batch of [`RawRecord`]s. Order is preserved within each
//! file; files are concatenated in caller-supplied order, and directories
//! expand to their `*.csv` entries sorted by file name so directory runs are
//! deterministic.
//!
//! The loader validates column presence only — all row-level parsing and
//! rejection accounting belongs to the cleaner.

use crate::types::RawRecord;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

// ============================================================================
// Errors
// ============================================================================

/// Fatal schema / file-level errors. Raised before any output is written.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{file}: missing required column '{column}'")]
    MissingColumn { file: String, column: &'static str },

    #[error("{file}: file is empty (no header row)")]
    EmptyFile { file: String },

    #[error("{file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// CSV Quote-Aware Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (handles commas inside quotes
/// and `""` escapes). Returns owned strings because quoted fields need
/// unquoting.
pub(crate) fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // Check for escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

// ============================================================================
// Column Mapping
// ============================================================================

const COL_TIMESTAMP: &str = "timestamp";
const COL_TURBINE_ID: &str = "turbine_id";
const COL_POWER_OUTPUT: &str = "power_output";

/// Indices of the required columns within a file's header.
///
/// Extra columns are ignored; matching is case-insensitive after trimming.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    timestamp: usize,
    turbine_id: usize,
    power_output: usize,
}

impl ColumnMap {
    fn from_header(header: &str, file: &str) -> Result<Self, IngestError> {
        let columns = csv_split(header);

        let find = |name: &'static str| -> Result<usize, IngestError> {
            columns
                .iter()
                .position(|c| c.trim().eq_ignore_ascii_case(name))
                .ok_or(IngestError::MissingColumn {
                    file: file.to_string(),
                    column: name,
                })
        };

        Ok(Self {
            timestamp: find(COL_TIMESTAMP)?,
            turbine_id: find(COL_TURBINE_ID)?,
            power_output: find(COL_POWER_OUTPUT)?,
        })
    }
}

// ============================================================================
// Loading
// ============================================================================

/// A loaded batch of raw records with basic provenance counts.
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    /// All rows, in file order then row order.
    pub records: Vec<RawRecord>,
    /// Number of input files read.
    pub files: usize,
}

/// Read and concatenate the given inputs (files and/or directories).
///
/// Directories expand to their `*.csv` entries sorted by file name. Every
/// file must carry the required columns; the first violation aborts the
/// whole load with the file and column named.
pub fn load_inputs(inputs: &[PathBuf]) -> Result<LoadedBatch, IngestError> {
    let files = expand_inputs(inputs)?;

    let mut records = Vec::new();
    for path in &files {
        load_file(path, &mut records)?;
    }

    info!(files = files.len(), rows = records.len(), "Raw feeds loaded");

    Ok(LoadedBatch {
        records,
        files: files.len(),
    })
}

/// Expand directories to sorted `*.csv` listings; pass files through as-is.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|source| IngestError::Io {
                file: input.display().to_string(),
                source,
            })?;

            let mut csvs: Vec<PathBuf> = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|source| IngestError::Io {
                    file: input.display().to_string(),
                    source,
                })?;
                let path = entry.path();
                let is_csv = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false);
                if path.is_file() && is_csv {
                    csvs.push(path);
                }
            }
            csvs.sort();
            files.extend(csvs);
        } else {
            files.push(input.clone());
        }
    }

    Ok(files)
}

/// Load one CSV file, appending its rows to `records`.
fn load_file(path: &Path, records: &mut Vec<RawRecord>) -> Result<(), IngestError> {
    let file_name = path.display().to_string();
    let source_file = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let file = File::open(path).map_err(|source| IngestError::Io {
        file: file_name.clone(),
        source,
    })?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let header = lines
        .next()
        .ok_or_else(|| IngestError::EmptyFile {
            file: file_name.clone(),
        })?
        .map_err(|source| IngestError::Io {
            file: file_name.clone(),
            source,
        })?;

    let col_map = ColumnMap::from_header(&header, &file_name)?;

    let mut line_num = 1usize;
    let mut rows = 0usize;
    for line_result in lines {
        line_num += 1;
        let line = line_result.map_err(|source| IngestError::Io {
            file: file_name.clone(),
            source,
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let fields = csv_split(&line);
        let get = |idx: usize| fields.get(idx).cloned().unwrap_or_default();

        records.push(RawRecord {
            timestamp: get(col_map.timestamp),
            turbine_id: get(col_map.turbine_id),
            power_output: get(col_map.power_output),
            source_file: source_file.clone(),
            line: line_num,
        });
        rows += 1;
    }

    info!(file = %file_name, rows, "Feed read");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).expect("create test file");
        f.write_all(content.as_bytes()).expect("write test file");
        path
    }

    #[test]
    fn csv_split_respects_quotes() {
        assert_eq!(csv_split("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(csv_split(r#""a,b",c"#), vec!["a,b", "c"]);
        assert_eq!(csv_split(r#""he said ""hi""",x"#), vec![r#"he said "hi""#, "x"]);
        assert_eq!(csv_split("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn loads_rows_in_file_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "feed.csv",
            "timestamp,turbine_id,power_output\n\
             2024-05-01T00:00:00Z,T1,1.5\n\
             2024-05-01T00:10:00Z,T2,\n",
        );

        let batch = load_inputs(&[path]).expect("load");
        assert_eq!(batch.files, 1);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].turbine_id, "T1");
        assert_eq!(batch.records[0].line, 2);
        assert_eq!(batch.records[1].power_output, "");
        assert_eq!(batch.records[1].source_file, "feed");
    }

    #[test]
    fn header_matching_is_case_insensitive_and_order_free() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "feed.csv",
            "Power_Output,TIMESTAMP,site,turbine_id\n\
             3.2,2024-05-01T00:00:00Z,north,T7\n",
        );

        let batch = load_inputs(&[path]).expect("load");
        assert_eq!(batch.records[0].power_output, "3.2");
        assert_eq!(batch.records[0].turbine_id, "T7");
        assert_eq!(batch.records[0].timestamp, "2024-05-01T00:00:00Z");
    }

    #[test]
    fn missing_column_names_file_and_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "broken.csv",
            "timestamp,turbine_id\n2024-05-01T00:00:00Z,T1\n",
        );

        let err = load_inputs(&[path]).expect_err("schema violation");
        match err {
            IngestError::MissingColumn { file, column } => {
                assert!(file.contains("broken.csv"));
                assert_eq!(column, "power_output");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn directory_expands_to_sorted_csvs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let header = "timestamp,turbine_id,power_output\n";
        write_file(dir.path(), "b.csv", &format!("{header}t2,T1,2.0\n"));
        write_file(dir.path(), "a.csv", &format!("{header}t1,T1,1.0\n"));
        write_file(dir.path(), "notes.txt", "not a feed\n");

        let batch = load_inputs(&[dir.path().to_path_buf()]).expect("load");
        assert_eq!(batch.files, 2);
        // a.csv rows come first even though b.csv was written first.
        assert_eq!(batch.records[0].source_file, "a");
        assert_eq!(batch.records[1].source_file, "b");
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_inputs(&[PathBuf::from("/nonexistent/feed.csv")]).expect_err("io error");
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
