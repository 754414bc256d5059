//! Cleaning stage: dedup, timestamp normalization, imputation, outlier fences.
//!
//! Operations, in order:
//! 1. Drop exact duplicate rows (raw field triple, first occurrence wins).
//! 2. Parse timestamps to UTC; unparseable rows are rejected and counted.
//! 3. Impute missing `power_output` with the per-turbine median of valid
//!    readings. Turbines with no valid readings cannot be imputed — their
//!    missing rows are dropped and counted.
//! 4. Remove outliers per turbine using a percentile fence:
//!    `[low_fence_factor × p(low), high_fence_factor × p(high)]` (defaults
//!    `0.5 × p01` and `1.5 × p99`). Negative readings are always removed
//!    regardless of the fences.
//!
//! Output is sorted by `(turbine_id, timestamp)` so downstream grouping and
//! all persisted artifacts are deterministic for identical input row sets.
//! Row-level problems are recovered by exclusion and reported through
//! [`CleaningReport`] — never by aborting the run.

use crate::config::CleaningConfig;
use crate::types::{RawRecord, Reading};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

// ============================================================================
// Report
// ============================================================================

/// Row accounting for one cleaning pass.
///
/// `output_rows = input_rows - duplicates - bad_timestamps
///  - missing_turbine_id - bad_power_values - unimputable - outliers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    /// Rows received from the loader.
    pub input_rows: usize,
    /// Exact duplicate rows removed (first occurrence kept).
    pub duplicates: usize,
    /// Rows dropped for an unparseable timestamp.
    pub bad_timestamps: usize,
    /// Rows dropped for an empty turbine identifier.
    pub missing_turbine_id: usize,
    /// Rows dropped for a malformed or non-finite power value.
    pub bad_power_values: usize,
    /// Missing power values filled with the per-turbine median.
    pub imputed: usize,
    /// Missing-value rows dropped because their turbine has no valid readings.
    pub unimputable: usize,
    /// Rows removed by the outlier fence (negatives always count here).
    pub outliers: usize,
    /// Rows surviving all stages.
    pub output_rows: usize,
}

/// Maximum number of per-row rejection warnings emitted before going quiet.
const MAX_ROW_WARNINGS: usize = 10;

// ============================================================================
// Timestamp parsing
// ============================================================================

/// Parse a raw timestamp string into a UTC instant.
///
/// Accepted formats, tried in order: RFC 3339, `%Y-%m-%d %H:%M:%S%:z`,
/// and the naive forms `%Y-%m-%dT%H:%M:%S` / `%Y-%m-%d %H:%M:%S` (with
/// optional fractional seconds), which are assumed to already be UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_matches('"');
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // "2024-05-01 12:00:00+00:00" (offset without the T separator)
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive timestamps are taken as UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}

// ============================================================================
// Cleaning
// ============================================================================

/// Reasons a row can be rejected during the parse stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RejectionReason {
    BadTimestamp,
    MissingTurbineId,
    BadPowerValue,
}

/// Row with parsed fields; power is still optional until imputation.
struct ParsedRow {
    timestamp: DateTime<Utc>,
    turbine_id: String,
    power: Option<f64>,
    source_file: String,
}

/// Clean a raw batch into validated readings plus a rejection report.
pub fn clean(records: Vec<RawRecord>, cfg: &CleaningConfig) -> (Vec<Reading>, CleaningReport) {
    let mut report = CleaningReport {
        input_rows: records.len(),
        ..CleaningReport::default()
    };

    // --- 1. Deduplicate on the raw field triple, first occurrence wins ---
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        let key = (
            record.timestamp.clone(),
            record.turbine_id.clone(),
            record.power_output.clone(),
        );
        if seen.insert(key) {
            unique.push(record);
        } else {
            report.duplicates += 1;
        }
    }

    // --- 2. Parse timestamps and power values, rejecting by exclusion ---
    let mut parsed = Vec::with_capacity(unique.len());
    let mut warnings = 0usize;
    for record in unique {
        match parse_record(&record) {
            Ok(row) => parsed.push(row),
            Err(reason) => {
                match reason {
                    RejectionReason::BadTimestamp => report.bad_timestamps += 1,
                    RejectionReason::MissingTurbineId => report.missing_turbine_id += 1,
                    RejectionReason::BadPowerValue => report.bad_power_values += 1,
                }
                if warnings < MAX_ROW_WARNINGS {
                    warn!(
                        file = %record.source_file,
                        line = record.line,
                        reason = ?reason,
                        "Rejected row"
                    );
                }
                warnings += 1;
            }
        }
    }

    // --- 3. Impute missing power with the per-turbine median ---
    let mut valid_by_turbine: HashMap<String, Vec<f64>> = HashMap::new();
    for row in &parsed {
        if let Some(power) = row.power {
            valid_by_turbine
                .entry(row.turbine_id.clone())
                .or_default()
                .push(power);
        }
    }
    let medians: HashMap<String, f64> = valid_by_turbine
        .into_iter()
        .map(|(turbine, values)| {
            let mut data = Data::new(values);
            (turbine, data.median())
        })
        .collect();

    let mut unimputable_turbines: HashMap<String, usize> = HashMap::new();
    let mut imputed = Vec::with_capacity(parsed.len());
    for row in parsed {
        let power = match row.power {
            Some(power) => power,
            None => match medians.get(&row.turbine_id) {
                Some(&median) => {
                    report.imputed += 1;
                    median
                }
                None => {
                    report.unimputable += 1;
                    *unimputable_turbines.entry(row.turbine_id).or_insert(0) += 1;
                    continue;
                }
            },
        };
        imputed.push(Reading {
            timestamp: row.timestamp,
            turbine_id: row.turbine_id,
            power_output: power,
            source_file: row.source_file,
        });
    }
    for (turbine, rows) in &unimputable_turbines {
        warn!(
            turbine = %turbine,
            rows = *rows,
            "Turbine has no valid power readings; its missing-value rows were dropped"
        );
    }

    // --- 4. Outlier fences per turbine; negatives always removed ---
    let mut powers_by_turbine: HashMap<String, Vec<f64>> = HashMap::new();
    for reading in &imputed {
        powers_by_turbine
            .entry(reading.turbine_id.clone())
            .or_default()
            .push(reading.power_output);
    }
    let fences: HashMap<String, (f64, f64)> = powers_by_turbine
        .into_iter()
        .map(|(turbine, values)| {
            let mut data = Data::new(values);
            let low = data.percentile(cfg.low_percentile) * cfg.low_fence_factor;
            let high = data.percentile(cfg.high_percentile) * cfg.high_fence_factor;
            (turbine, (low, high))
        })
        .collect();

    let mut cleaned: Vec<Reading> = imputed
        .into_iter()
        .filter(|reading| {
            if reading.power_output < 0.0 {
                report.outliers += 1;
                return false;
            }
            match fences.get(&reading.turbine_id) {
                Some(&(low, high)) => {
                    if reading.power_output < low || reading.power_output > high {
                        report.outliers += 1;
                        false
                    } else {
                        true
                    }
                }
                None => true,
            }
        })
        .collect();

    // --- 5. Canonical order for deterministic downstream output ---
    cleaned.sort_by(|a, b| {
        a.turbine_id
            .cmp(&b.turbine_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    report.output_rows = cleaned.len();
    info!(
        input = report.input_rows,
        output = report.output_rows,
        duplicates = report.duplicates,
        rejected = report.bad_timestamps + report.missing_turbine_id + report.bad_power_values,
        imputed = report.imputed,
        unimputable = report.unimputable,
        outliers = report.outliers,
        "Cleaning complete"
    );

    (cleaned, report)
}

/// Parse one deduplicated raw record into a [`ParsedRow`].
fn parse_record(record: &RawRecord) -> Result<ParsedRow, RejectionReason> {
    let timestamp = parse_timestamp(&record.timestamp).ok_or(RejectionReason::BadTimestamp)?;

    let turbine_id = record.turbine_id.trim();
    if turbine_id.is_empty() {
        return Err(RejectionReason::MissingTurbineId);
    }

    let power_raw = record.power_output.trim();
    let power = if power_raw.is_empty() || power_raw.eq_ignore_ascii_case("nan") {
        None
    } else {
        let value: f64 = power_raw
            .parse()
            .map_err(|_| RejectionReason::BadPowerValue)?;
        if !value.is_finite() {
            return Err(RejectionReason::BadPowerValue);
        }
        Some(value)
    };

    Ok(ParsedRow {
        timestamp,
        turbine_id: turbine_id.to_string(),
        power,
        source_file: record.source_file.clone(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(timestamp: &str, turbine: &str, power: &str) -> RawRecord {
        RawRecord {
            timestamp: timestamp.to_string(),
            turbine_id: turbine.to_string(),
            power_output: power.to_string(),
            source_file: "test".to_string(),
            line: 0,
        }
    }

    #[test]
    fn exact_duplicates_removed_first_kept() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "2.0"),
            raw("2024-05-01T00:00:00Z", "T1", "2.0"),
            raw("2024-05-01T00:10:00Z", "T1", "2.0"),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.duplicates, 1);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn cleaning_twice_yields_same_row_set() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "2.0"),
            raw("2024-05-01T00:10:00Z", "T1", "4.0"),
            raw("2024-05-01T00:20:00Z", "T1", "6.0"),
            raw("2024-05-01T00:20:00Z", "T1", "6.0"),
        ];
        let (first, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.duplicates, 1);

        // Round-trip the cleaned readings back through the cleaner.
        let again: Vec<RawRecord> = first
            .iter()
            .map(|r| {
                raw(
                    &r.timestamp.to_rfc3339(),
                    &r.turbine_id,
                    &r.power_output.to_string(),
                )
            })
            .collect();
        let (second, report2) = clean(again, &CleaningConfig::default());

        assert_eq!(report2.duplicates, 0);
        assert_eq!(report2.outliers, 0);
        assert_eq!(second, first);
    }

    #[test]
    fn unparseable_timestamp_rejected_not_fatal() {
        let records = vec![
            raw("not-a-date", "T1", "2.0"),
            raw("2024-05-01T00:00:00Z", "T1", "3.0"),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.bad_timestamps, 1);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn timestamp_offsets_normalize_to_utc() {
        let records = vec![
            raw("2024-05-01T02:00:00+02:00", "T1", "1.0"),
            raw("2024-05-01 00:00:00+00:00", "T1", "2.0"),
            raw("2024-05-01 00:00:30", "T1", "3.0"),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.bad_timestamps, 0);
        // The +02:00 offset and the explicit UTC row name the same instant —
        // both land on 2024-05-01T00:00:00Z.
        assert_eq!(cleaned[0].timestamp, cleaned[1].timestamp);
        assert_eq!(cleaned[0].day(), cleaned[2].day());
    }

    #[test]
    fn missing_power_imputed_with_turbine_median() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "2.0"),
            raw("2024-05-01T00:10:00Z", "T1", "4.0"),
            raw("2024-05-01T00:20:00Z", "T1", "6.0"),
            raw("2024-05-01T00:30:00Z", "T1", ""),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.imputed, 1);
        assert_eq!(cleaned.len(), 4);
        let imputed = cleaned
            .iter()
            .find(|r| r.timestamp.to_rfc3339().starts_with("2024-05-01T00:30"))
            .expect("imputed row present");
        assert!((imputed.power_output - 4.0).abs() < 1e-12);
    }

    #[test]
    fn median_is_ignorant_of_other_turbines() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "2.0"),
            raw("2024-05-01T00:10:00Z", "T1", ""),
            raw("2024-05-01T00:00:00Z", "T2", "100.0"),
            raw("2024-05-01T00:10:00Z", "T2", "100.0"),
        ];
        let (cleaned, _report) = clean(records, &CleaningConfig::default());
        let t1_imputed = cleaned
            .iter()
            .find(|r| r.turbine_id == "T1" && r.timestamp.to_rfc3339().starts_with("2024-05-01T00:10"))
            .expect("T1 imputed row");
        assert!((t1_imputed.power_output - 2.0).abs() < 1e-12);
    }

    #[test]
    fn turbine_without_valid_readings_drops_missing_rows() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T9", ""),
            raw("2024-05-01T00:10:00Z", "T9", ""),
            raw("2024-05-01T00:00:00Z", "T1", "5.0"),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.unimputable, 2);
        assert_eq!(report.imputed, 0);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].turbine_id, "T1");
    }

    #[test]
    fn negative_power_always_removed() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "-5.0"),
            raw("2024-05-01T00:10:00Z", "T1", "4.0"),
            raw("2024-05-01T00:20:00Z", "T1", "4.0"),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.outliers, 1);
        assert!(cleaned.iter().all(|r| r.power_output >= 0.0));
    }

    #[test]
    fn malformed_power_rejected() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "garbage"),
            raw("2024-05-01T00:10:00Z", "T1", "inf"),
            raw("2024-05-01T00:20:00Z", "T1", "3.0"),
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.bad_power_values, 2);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn output_sorted_by_turbine_then_time() {
        let records = vec![
            raw("2024-05-01T02:00:00Z", "T2", "1.0"),
            raw("2024-05-01T01:00:00Z", "T1", "1.0"),
            raw("2024-05-01T00:00:00Z", "T2", "1.0"),
        ];
        let (cleaned, _report) = clean(records, &CleaningConfig::default());
        let order: Vec<(&str, i64)> = cleaned
            .iter()
            .map(|r| (r.turbine_id.as_str(), r.timestamp.timestamp()))
            .collect();
        let mut expected = order.clone();
        expected.sort();
        assert_eq!(order, expected);
        assert_eq!(cleaned[0].turbine_id, "T1");
    }

    #[test]
    fn report_counts_balance() {
        let records = vec![
            raw("2024-05-01T00:00:00Z", "T1", "2.0"),
            raw("2024-05-01T00:00:00Z", "T1", "2.0"), // duplicate
            raw("bad", "T1", "2.0"),                  // bad timestamp
            raw("2024-05-01T00:10:00Z", "", "2.0"),   // missing turbine
            raw("2024-05-01T00:20:00Z", "T1", "x"),   // bad power
            raw("2024-05-01T00:30:00Z", "T1", "-1.0"), // negative outlier
            raw("2024-05-01T00:40:00Z", "T1", ""),    // imputed
        ];
        let (cleaned, report) = clean(records, &CleaningConfig::default());
        assert_eq!(report.input_rows, 7);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.bad_timestamps, 1);
        assert_eq!(report.missing_turbine_id, 1);
        assert_eq!(report.bad_power_values, 1);
        assert_eq!(report.imputed, 1);
        assert_eq!(report.outliers, 1);
        assert_eq!(report.output_rows, cleaned.len());
        assert_eq!(
            report.output_rows,
            report.input_rows
                - report.duplicates
                - report.bad_timestamps
                - report.missing_turbine_id
                - report.bad_power_values
                - report.unimputable
                - report.outliers
        );
    }
}
