use crate::dataflash::record::MOTOR_COUNT;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Append-only series of samples in decode order.
///
/// Only the aggregator can grow a channel; everyone else sees a slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(Vec<f64>);

impl Channel {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, sample: f64) {
        self.0.push(sample);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn first(&self) -> Option<f64> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }
}

impl Deref for Channel {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl AsRef<[f64]> for Channel {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for Channel {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

impl FromIterator<f64> for Channel {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-channel time series reconstructed from one log.
///
/// Channels fill independently, so their lengths generally differ.
/// `timestamps` pairs with the battery channels only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightTelemetry {
    /// Seconds, one per battery sample.
    pub timestamps: Channel,
    pub battery_voltage: Channel,
    pub battery_current: Channel,
    /// Vibration magnitude.
    pub vibration: Channel,
    pub gps_hdop: Channel,
    /// One independent channel per motor index.
    pub motor_outputs: [Channel; MOTOR_COUNT],
    /// Meters.
    pub altitude: Channel,
}

impl FlightTelemetry {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
            && self.battery_voltage.is_empty()
            && self.battery_current.is_empty()
            && self.vibration.is_empty()
            && self.gps_hdop.is_empty()
            && self.motor_outputs.iter().all(|motor| motor.is_empty())
            && self.altitude.is_empty()
    }

    /// Number of motors that logged at least one output.
    pub fn active_motor_count(&self) -> usize {
        self.motor_outputs
            .iter()
            .filter(|motor| !motor.is_empty())
            .count()
    }

    /// Seconds between the first and last battery timestamp.
    pub fn duration_secs(&self) -> Option<f64> {
        Some(self.timestamps.last()? - self.timestamps.first()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_telemetry_has_no_duration() {
        let telemetry = FlightTelemetry::default();
        assert!(telemetry.is_empty());
        assert_eq!(telemetry.duration_secs(), None);
        assert_eq!(telemetry.active_motor_count(), 0);
    }

    #[test]
    fn channels_serialize_as_plain_arrays() {
        let telemetry = FlightTelemetry {
            altitude: Channel::from(vec![1.0, 2.5]),
            ..Default::default()
        };
        let json = serde_json::to_value(&telemetry).unwrap();
        assert_eq!(json["altitude"], serde_json::json!([1.0, 2.5]));
        assert_eq!(json["motor_outputs"], serde_json::json!([[], [], [], []]));
    }
}
