//! The three independent anomaly checks.
//!
//! Each detector is a pure function over one or more telemetry channels plus a
//! threshold, wrapped in a [`Detector`](crate::prelude::Detector) impl so the
//! orchestrator can run them uniformly.

pub mod motor;
pub mod report;
pub mod vibration;
pub mod voltage;

pub use motor::{
    detect_motor_imbalance, ImbalanceSummary, MotorDeviation, MotorImbalanceDetector,
    MOTOR_IMBALANCE,
};
pub use report::AnomalyReport;
pub use vibration::{
    detect_vibration_spikes, SpikeSummary, VibrationSpikeDetector, VIBRATION_SPIKES,
};
pub use voltage::{detect_voltage_sag, SagSummary, VoltageSagDetector, VOLTAGE_SAG};
