use crate::detection::report::AnomalyReport;
use crate::math::stats::StatsHelper;
use crate::prelude::Detector;
use crate::telemetry::FlightTelemetry;

pub const VOLTAGE_SAG: &str = "voltage_sag";

/// Sag events and the lowest voltage among them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SagSummary {
    pub count: usize,
    pub min_voltage: Option<f64>,
}

/// Counts samples strictly below `threshold`.
pub fn detect_voltage_sag(voltage: &[f64], threshold: f64) -> SagSummary {
    let sags: Vec<f64> = voltage.iter().copied().filter(|&v| v < threshold).collect();
    SagSummary {
        count: sags.len(),
        min_voltage: StatsHelper::min(&sags),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VoltageSagDetector {
    pub threshold: f64,
}

impl Detector for VoltageSagDetector {
    fn name(&self) -> &'static str {
        VOLTAGE_SAG
    }

    fn detect(&self, telemetry: &FlightTelemetry) -> AnomalyReport {
        let summary = detect_voltage_sag(&telemetry.battery_voltage, self.threshold);
        AnomalyReport::events(summary.count, summary.min_voltage)
    }
}
