//! Daily summary statistics over cleaned readings.
//!
//! Groups by `(turbine_id, UTC calendar day)` and folds each group through a
//! Welford accumulator, producing min/max/mean plus the sample standard
//! deviation the anomaly detector flags against. Grouping runs over a
//! `BTreeMap`, so the output is identical regardless of input row order.

use crate::types::{DailyStat, Reading};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// Accumulator
// ============================================================================

/// Running aggregate for one `(turbine, day)` group.
///
/// Uses Welford's online algorithm for numerically stable mean/variance.
#[derive(Debug, Clone, Copy)]
struct DailyAccumulator {
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl DailyAccumulator {
    fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Sample variance (divisor n − 1); 0.0 when fewer than two samples.
    fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Compute per-turbine, per-day min/max/mean (and stddev/count) over the
/// cleaned readings.
///
/// Every `(turbine_id, day)` pair present in the input appears exactly once;
/// groups with zero readings cannot exist. Output is sorted by
/// `(turbine_id, day)` and is independent of input row order.
pub fn compute_daily_stats(readings: &[Reading]) -> Vec<DailyStat> {
    let mut groups: BTreeMap<(String, NaiveDate), DailyAccumulator> = BTreeMap::new();

    for reading in readings {
        groups
            .entry((reading.turbine_id.clone(), reading.day()))
            .or_insert_with(DailyAccumulator::new)
            .add(reading.power_output);
    }

    let stats: Vec<DailyStat> = groups
        .into_iter()
        .map(|((turbine_id, day), acc)| DailyStat {
            turbine_id,
            day,
            min: acc.min,
            max: acc.max,
            mean: acc.mean,
            stddev: acc.std_dev(),
            count: acc.count,
        })
        .collect();

    info!(
        readings = readings.len(),
        groups = stats.len(),
        "Daily statistics computed"
    );

    stats
}

// ============================================================================
// Tests
// ============================================================================
