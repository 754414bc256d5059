//! Pipeline configuration — all tunables as operator-editable TOML values.
//!
//! Every threshold has a built-in default matching the documented cleaning
//! and detection policy, so the pipeline behaves identically with no config
//! file present.
//!
//! ## Loading Order
//!
//! 1. `WINDFARM_CONFIG` environment variable (path to TOML file)
//! 2. `pipeline_config.toml` in the current working directory
//! 3. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one pipeline invocation.
///
/// Load with [`PipelineConfig::load`], or [`PipelineConfig::load_from_file`]
/// when the caller supplies an explicit path (e.g. via `--config`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input location defaults.
    #[serde(default)]
    pub input: InputConfig,

    /// Output location defaults.
    #[serde(default)]
    pub output: OutputConfig,

    /// Cleaning stage tunables (outlier fences).
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Anomaly detection tunables.
    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

/// Where raw CSV feeds are read from when no inputs are given on the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory scanned for `*.csv` files.
    #[serde(default = "default_input_dir")]
    pub dir: PathBuf,
}

/// Where the three output artifacts are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, created if missing. Prior artifacts are overwritten.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

/// Outlier fence policy for the cleaning stage.
///
/// Per turbine, readings outside `[low_fence_factor × p(low_percentile),
/// high_fence_factor × p(high_percentile)]` are removed. Negative readings
/// are always removed regardless of the fences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Lower percentile of the fence (default: 1st).
    #[serde(default = "default_low_percentile")]
    pub low_percentile: usize,

    /// Upper percentile of the fence (default: 99th).
    #[serde(default = "default_high_percentile")]
    pub high_percentile: usize,

    /// Multiplier extending the lower percentile downward (default: 0.5).
    #[serde(default = "default_low_fence_factor")]
    pub low_fence_factor: f64,

    /// Multiplier extending the upper percentile upward (default: 1.5).
    #[serde(default = "default_high_fence_factor")]
    pub high_fence_factor: f64,
}

/// Anomaly detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Sigma multiplier: a reading is anomalous iff its absolute deviation
    /// from the same-day mean strictly exceeds `sigma_threshold × stddev`.
    #[serde(default = "default_sigma_threshold")]
    pub sigma_threshold: f64,
}

// ============================================================================
// Defaults
// ============================================================================

fn default_input_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_low_percentile() -> usize {
    1
}

fn default_high_percentile() -> usize {
    99
}

fn default_low_fence_factor() -> f64 {
    0.5
}

fn default_high_fence_factor() -> f64 {
    1.5
}

fn default_sigma_threshold() -> f64 {
    2.0
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: default_input_dir(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            low_percentile: default_low_percentile(),
            high_percentile: default_high_percentile(),
            low_fence_factor: default_low_fence_factor(),
            high_fence_factor: default_high_fence_factor(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sigma_threshold: default_sigma_threshold(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Default config file name searched in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pipeline_config.toml";

/// Environment variable naming an explicit config file path.
pub const CONFIG_ENV_VAR: &str = "WINDFARM_CONFIG";

/// Error loading an explicitly named config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `WINDFARM_CONFIG` environment variable
    /// 2. `./pipeline_config.toml`
    /// 3. Built-in defaults
    ///
    /// An unreadable or invalid file falls back to the next source with a
    /// WARN rather than aborting the run.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            match Self::load_from_file(&p) {
                Ok(config) => {
                    info!(path = %p.display(), "Loaded pipeline config from {CONFIG_ENV_VAR}");
                    return config;
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "Ignoring {CONFIG_ENV_VAR}, falling back");
                }
            }
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!(path = %local.display(), "Loaded pipeline config");
                    return config;
                }
                Err(e) => {
                    warn!(path = %local.display(), error = %e, "Invalid config file, using defaults");
                }
            }
        }

        Self::default()
    }

    /// Load configuration from an explicit TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = PipelineConfig::default();
        assert_eq!(config.cleaning.low_percentile, 1);
        assert_eq!(config.cleaning.high_percentile, 99);
        assert!((config.cleaning.low_fence_factor - 0.5).abs() < f64::EPSILON);
        assert!((config.cleaning.high_fence_factor - 1.5).abs() < f64::EPSILON);
        assert!((config.anomaly.sigma_threshold - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.input.dir, PathBuf::from("data"));
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [anomaly]
            sigma_threshold = 3.0

            [output]
            dir = "artifacts"
            "#,
        )
        .expect("valid TOML");

        assert!((config.anomaly.sigma_threshold - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.output.dir, PathBuf::from("artifacts"));
        // Untouched sections keep the built-in defaults.
        assert_eq!(config.cleaning.low_percentile, 1);
        assert_eq!(config.input.dir, PathBuf::from("data"));
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: PipelineConfig = toml::from_str("").expect("empty TOML");
        assert_eq!(config.cleaning.high_percentile, 99);
        assert!((config.anomaly.sigma_threshold - 2.0).abs() < f64::EPSILON);
    }
}
