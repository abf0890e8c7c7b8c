use anyhow::Context;
use flightcore::AnalysisConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub voltage_threshold: f64,
    pub z_threshold: f64,
    pub imbalance_threshold_pct: f64,
    pub parallel_detectors: bool,
    pub include_summary: bool,
    /// Appends one JSON line per analyzed log when set.
    pub report_path: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let analysis = AnalysisConfig::default();
        Self {
            voltage_threshold: analysis.voltage_threshold,
            z_threshold: analysis.z_threshold,
            imbalance_threshold_pct: analysis.imbalance_threshold_pct,
            parallel_detectors: false,
            include_summary: false,
            report_path: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .to_analysis_config()
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn from_args(voltage_threshold: f64, z_threshold: f64, imbalance_threshold_pct: f64) -> Self {
        Self {
            voltage_threshold,
            z_threshold,
            imbalance_threshold_pct,
            ..Default::default()
        }
    }

    /// Replaces each threshold that was given on the command line.
    pub fn with_overrides(
        mut self,
        voltage_threshold: Option<f64>,
        z_threshold: Option<f64>,
        imbalance_threshold_pct: Option<f64>,
    ) -> Self {
        if let Some(value) = voltage_threshold {
            self.voltage_threshold = value;
        }
        if let Some(value) = z_threshold {
            self.z_threshold = value;
        }
        if let Some(value) = imbalance_threshold_pct {
            self.imbalance_threshold_pct = value;
        }
        self
    }

    pub fn to_analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            voltage_threshold: self.voltage_threshold,
            z_threshold: self.z_threshold,
            imbalance_threshold_pct: self.imbalance_threshold_pct,
        }
    }
}
