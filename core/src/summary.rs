//! Aggregated statistics handed to the narrative/report collaborators.
//!
//! Values are rounded to two decimals; a statistic over an empty channel is
//! `None` rather than zero so consumers can tell "no data" from "measured 0".

use crate::analysis::AnalysisResult;
use crate::math::stats::StatsHelper;
use crate::telemetry::FlightTelemetry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryStats {
    pub min_voltage: Option<f64>,
    pub max_voltage: Option<f64>,
    pub avg_voltage: Option<f64>,
    pub avg_current: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationStats {
    pub max_vibration: Option<f64>,
    pub avg_vibration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsStats {
    pub avg_hdop: Option<f64>,
    pub max_hdop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorStats {
    pub motors_analyzed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeStats {
    pub max_altitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyStats {
    pub voltage_sag_events: usize,
    pub min_voltage_during_sag: Option<f64>,
    pub vibration_spikes: usize,
    pub max_vibration_spike: Option<f64>,
    pub motor_imbalance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSummary {
    /// Whole seconds between the first and last battery sample.
    pub flight_duration_sec: u64,
    pub battery_stats: BatteryStats,
    pub vibration_stats: VibrationStats,
    pub gps_stats: GpsStats,
    pub motor_stats: MotorStats,
    pub altitude_stats: AltitudeStats,
    pub anomalies: AnomalyStats,
}

fn rounded(value: Option<f64>) -> Option<f64> {
    value.map(StatsHelper::round2)
}

impl FlightSummary {
    pub fn from_analysis(telemetry: &FlightTelemetry, result: &AnalysisResult) -> Self {
        let flight_duration_sec = telemetry
            .duration_secs()
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map_or(0, |secs| secs.trunc() as u64);

        let sag = result.voltage_sag();
        let spikes = result.vibration_spikes();

        Self {
            flight_duration_sec,
            battery_stats: BatteryStats {
                min_voltage: rounded(StatsHelper::min(&telemetry.battery_voltage)),
                max_voltage: rounded(StatsHelper::max(&telemetry.battery_voltage)),
                avg_voltage: rounded(StatsHelper::mean(&telemetry.battery_voltage)),
                avg_current: rounded(StatsHelper::mean(&telemetry.battery_current)),
            },
            vibration_stats: VibrationStats {
                max_vibration: rounded(StatsHelper::max(&telemetry.vibration)),
                avg_vibration: rounded(StatsHelper::mean(&telemetry.vibration)),
            },
            gps_stats: GpsStats {
                avg_hdop: rounded(StatsHelper::mean(&telemetry.gps_hdop)),
                max_hdop: rounded(StatsHelper::max(&telemetry.gps_hdop)),
            },
            motor_stats: MotorStats {
                motors_analyzed: telemetry.active_motor_count(),
            },
            altitude_stats: AltitudeStats {
                max_altitude: rounded(StatsHelper::max(&telemetry.altitude)),
            },
            anomalies: AnomalyStats {
                voltage_sag_events: sag.map_or(0, |report| report.count),
                min_voltage_during_sag: sag.and_then(|report| report.extremum),
                vibration_spikes: spikes.map_or(0, |report| report.count),
                max_vibration_spike: spikes.and_then(|report| report.extremum),
                motor_imbalance: result
                    .motor_imbalance()
                    .and_then(|report| report.message.clone()),
            },
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
