//! Point-level anomaly detection against same-day statistics.
//!
//! A cleaned reading is anomalous iff its absolute deviation from its
//! `(turbine, day)` mean strictly exceeds `sigma_threshold ×` that day's
//! sample standard deviation (default 2σ; a reading at exactly the
//! threshold is NOT flagged).
//!
//! Zero-variance guard: a day whose stddev is 0 (constant output, or a
//! single reading) never flags anything — with no measurable variation
//! there is no basis for calling a reading abnormal, and the guard also
//! keeps the comparison away from the degenerate 0-tolerance case.

use crate::config::AnomalyConfig;
use crate::types::{AnomalyRecord, DailyStat, Reading};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{error, info};

/// Flag readings deviating more than the configured sigma multiple from
/// their same-day, same-turbine mean.
///
/// `stats` must be the statistics computed from the same cleaned set; a
/// reading without a matching `(turbine, day)` entry is a wiring bug and is
/// logged at ERROR and skipped rather than panicking. Output preserves the
/// cleaned readings' canonical order, so it is stable and reproducible.
pub fn detect_anomalies(
    readings: &[Reading],
    stats: &[DailyStat],
    cfg: &AnomalyConfig,
) -> Vec<AnomalyRecord> {
    let index: HashMap<(&str, NaiveDate), &DailyStat> = stats
        .iter()
        .map(|s| ((s.turbine_id.as_str(), s.day), s))
        .collect();

    let mut anomalies = Vec::new();
    for reading in readings {
        let Some(stat) = index.get(&(reading.turbine_id.as_str(), reading.day())) else {
            error!(
                turbine = %reading.turbine_id,
                day = %reading.day(),
                "No daily statistic for reading; skipping"
            );
            continue;
        };

        // Constant-output days can never flag.
        if stat.stddev <= 0.0 {
            continue;
        }

        let deviation = (reading.power_output - stat.mean).abs();
        if deviation > cfg.sigma_threshold * stat.stddev {
            anomalies.push(AnomalyRecord {
                timestamp: reading.timestamp,
                turbine_id: reading.turbine_id.clone(),
                power_output: reading.power_output,
                source_file: reading.source_file.clone(),
                day_mean: stat.mean,
                day_stddev: stat.stddev,
            });
        }
    }

    info!(
        readings = readings.len(),
        anomalies = anomalies.len(),
        sigma = cfg.sigma_threshold,
        "Anomaly detection complete"
    );

    anomalies
}

// ============================================================================
// Tests
// ============================================================================
