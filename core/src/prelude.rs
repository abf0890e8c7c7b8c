use crate::detection::AnomalyReport;
use crate::telemetry::FlightTelemetry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_VOLTAGE_THRESHOLD: f64 = 7.2;
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
pub const DEFAULT_IMBALANCE_THRESHOLD_PCT: f64 = 15.0;

/// Detector thresholds shared by every analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum safe battery voltage; samples below it count as sag events.
    pub voltage_threshold: f64,
    /// Sigma multiple above which a vibration sample counts as a spike.
    pub z_threshold: f64,
    /// Percentage deviation from the fleet-average motor output that flags a motor.
    pub imbalance_threshold_pct: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            voltage_threshold: DEFAULT_VOLTAGE_THRESHOLD,
            z_threshold: DEFAULT_Z_THRESHOLD,
            imbalance_threshold_pct: DEFAULT_IMBALANCE_THRESHOLD_PCT,
        }
    }
}

impl AnalysisConfig {
    pub fn with_voltage_threshold(mut self, threshold: f64) -> Self {
        self.voltage_threshold = threshold;
        self
    }

    pub fn with_z_threshold(mut self, threshold: f64) -> Self {
        self.z_threshold = threshold;
        self
    }

    pub fn with_imbalance_threshold_pct(mut self, threshold: f64) -> Self {
        self.imbalance_threshold_pct = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.voltage_threshold.is_finite() {
            return Err(AnalysisError::InvalidConfig(
                "voltage_threshold must be finite".into(),
            ));
        }
        if !self.z_threshold.is_finite() {
            return Err(AnalysisError::InvalidConfig(
                "z_threshold must be finite".into(),
            ));
        }
        if !self.imbalance_threshold_pct.is_finite() || self.imbalance_threshold_pct < 0.0 {
            return Err(AnalysisError::InvalidConfig(
                "imbalance_threshold_pct must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

/// Failure reading the source log. Fatal for the run that hit it.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("failed to open log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error while decoding log: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for an analysis run.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type AnalysisOutcome<T> = Result<T, AnalysisError>;

/// A stateless anomaly check over the aggregated telemetry.
///
/// Implementations read only the channels they need and never observe each
/// other, so they can run in any order or concurrently.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, telemetry: &FlightTelemetry) -> AnomalyReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = AnalysisConfig::default();
        assert_eq!(config.voltage_threshold, 7.2);
        assert_eq!(config.z_threshold, 3.0);
        assert_eq!(config.imbalance_threshold_pct, 15.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn thresholds_override_independently() {
        let config = AnalysisConfig::default().with_z_threshold(2.5);
        assert_eq!(config.z_threshold, 2.5);
        assert_eq!(config.voltage_threshold, DEFAULT_VOLTAGE_THRESHOLD);
        assert_eq!(config.imbalance_threshold_pct, DEFAULT_IMBALANCE_THRESHOLD_PCT);
    }

    #[test]
    fn validate_rejects_degenerate_thresholds() {
        assert!(AnalysisConfig::default()
            .with_z_threshold(f64::INFINITY)
            .validate()
            .is_err());
        assert!(AnalysisConfig::default()
            .with_voltage_threshold(f64::NAN)
            .validate()
            .is_err());
        assert!(AnalysisConfig::default()
            .with_imbalance_threshold_pct(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn zero_and_negative_z_thresholds_are_allowed() {
        for z in [0.0, -1.5] {
            assert!(AnalysisConfig::default()
                .with_z_threshold(z)
                .validate()
                .is_ok());
        }
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"z_threshold": 2.0}"#).unwrap();
        assert_eq!(config.z_threshold, 2.0);
        assert_eq!(config.voltage_threshold, DEFAULT_VOLTAGE_THRESHOLD);
    }
}
