use crate::detection::report::AnomalyReport;
use crate::math::stats::StatsHelper;
use crate::prelude::Detector;
use crate::telemetry::FlightTelemetry;

pub const VIBRATION_SPIKES: &str = "vibration_spikes";

/// Spike count and the largest spiking sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeSummary {
    pub count: usize,
    pub max_vibration: Option<f64>,
}

impl SpikeSummary {
    const NONE: SpikeSummary = SpikeSummary {
        count: 0,
        max_vibration: None,
    };
}

/// Flags samples whose z-score against the whole channel exceeds `z_threshold`.
///
/// Mean and standard deviation are population statistics over every sample.
/// Only the upper tail counts. A flat channel (zero deviation) never spikes.
pub fn detect_vibration_spikes(vibration: &[f64], z_threshold: f64) -> SpikeSummary {
    if vibration.len() < 2 {
        return SpikeSummary::NONE;
    }
    // Rounding in the mean can leave a tiny nonzero spread on constant data.
    if vibration.iter().all(|&v| v == vibration[0]) {
        return SpikeSummary::NONE;
    }
    let (Some(mean), Some(std)) = (
        StatsHelper::mean(vibration),
        StatsHelper::population_std(vibration),
    ) else {
        return SpikeSummary::NONE;
    };
    if std == 0.0 || !std.is_finite() {
        return SpikeSummary::NONE;
    }

    let spikes: Vec<f64> = vibration
        .iter()
        .copied()
        .filter(|&v| (v - mean) / std > z_threshold)
        .collect();
    SpikeSummary {
        count: spikes.len(),
        max_vibration: StatsHelper::max(&spikes),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VibrationSpikeDetector {
    pub z_threshold: f64,
}

impl Detector for VibrationSpikeDetector {
    fn name(&self) -> &'static str {
        VIBRATION_SPIKES
    }

    fn detect(&self, telemetry: &FlightTelemetry) -> AnomalyReport {
        let summary = detect_vibration_spikes(&telemetry.vibration, self.z_threshold);
        AnomalyReport::events(summary.count, summary.max_vibration)
    }
}
