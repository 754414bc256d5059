//! Core data types shared by all pipeline stages.
//!
//! Plain records, no logic: the loader produces [`RawRecord`]s, the cleaner
//! turns them into [`Reading`]s, the statistics engine aggregates those into
//! [`DailyStat`]s, and the anomaly detector emits [`AnomalyRecord`]s.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

// ============================================================================
// Raw input
// ============================================================================

/// One row as read from an input CSV, before any parsing or validation.
///
/// Field values are kept as raw strings so that the cleaner owns all
/// parsing decisions (and their rejection accounting). `power_output` may
/// be empty — that is a missing value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Timestamp column, verbatim.
    pub timestamp: String,
    /// Turbine identifier column, verbatim.
    pub turbine_id: String,
    /// Power output column, verbatim (may be empty).
    pub power_output: String,
    /// File stem of the input file this row came from.
    pub source_file: String,
    /// 1-based line number within the source file, for diagnostics.
    pub line: usize,
}

// ============================================================================
// Cleaned readings
// ============================================================================

/// A single validated sensor observation.
///
/// Post-cleaning invariant: `power_output` is finite and non-negative, and
/// `timestamp` is a canonical UTC instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Observation instant, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Stable turbine identifier.
    pub turbine_id: String,
    /// Power output in megawatts.
    pub power_output: f64,
    /// Provenance: file stem of the originating input file.
    pub source_file: String,
}

impl Reading {
    /// UTC calendar day this reading falls on — the grouping key component
    /// shared by the statistics engine and the anomaly detector.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

// ============================================================================
// Daily aggregates
// ============================================================================

/// Per-turbine, per-UTC-day aggregate of power output.
///
/// Exactly one exists per `(turbine_id, day)` pair present in the cleaned
/// data; never mutated after creation. `stddev` and `count` are carried so
/// the anomaly detector flags against the exact same aggregation — only the
/// min/max/mean columns appear in the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStat {
    pub turbine_id: String,
    pub day: NaiveDate,
    /// Minimum power output over the day (MW).
    pub min: f64,
    /// Maximum power output over the day (MW).
    pub max: f64,
    /// Arithmetic mean power output over the day (MW).
    pub mean: f64,
    /// Sample standard deviation (divisor n − 1); 0.0 when count < 2.
    pub stddev: f64,
    /// Number of cleaned readings in the group.
    pub count: usize,
}

// ============================================================================
// Anomalies
// ============================================================================

/// A cleaned reading flagged as statistically anomalous, together with the
/// day-level mean and standard deviation that justify the flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub timestamp: DateTime<Utc>,
    pub turbine_id: String,
    pub power_output: f64,
    pub source_file: String,
    /// Mean of the reading's (turbine, day) group.
    pub day_mean: f64,
    /// Sample standard deviation of the reading's (turbine, day) group.
    pub day_stddev: f64,
}
