use crate::dataflash::decoder::Decoder;
use crate::dataflash::record::Record;
use crate::prelude::DecodeError;
use crate::telemetry::channels::FlightTelemetry;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::DecodeMetrics;
use std::io::Read;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Appends decoded records to the channel matching their kind.
pub struct TelemetryAggregator {
    telemetry: FlightTelemetry,
}

impl TelemetryAggregator {
    pub fn new() -> Self {
        Self {
            telemetry: FlightTelemetry::default(),
        }
    }

    pub fn push(&mut self, record: &Record) {
        let telemetry = &mut self.telemetry;
        match record {
            Record::Battery(bat) => {
                telemetry.battery_voltage.push(bat.voltage);
                telemetry.battery_current.push(bat.current);
                telemetry
                    .timestamps
                    .push(bat.time_us as f64 / MICROS_PER_SECOND);
            }
            Record::Vibration(vibe) => telemetry.vibration.push(vibe.magnitude()),
            Record::Gps(gps) => telemetry.gps_hdop.push(gps.hdop()),
            Record::MotorOutput(rcou) => {
                for (channel, pwm) in telemetry.motor_outputs.iter_mut().zip(rcou.channels) {
                    if let Some(pwm) = pwm {
                        channel.push(pwm);
                    }
                }
            }
            Record::Barometer(baro) => telemetry.altitude.push(baro.altitude),
        }
    }

    pub fn finish(self) -> FlightTelemetry {
        self.telemetry
    }
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn aggregate<'a, I>(records: I) -> FlightTelemetry
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut aggregator = TelemetryAggregator::new();
    for record in records {
        aggregator.push(record);
    }
    aggregator.finish()
}

/// Drains a decoder into telemetry, stopping at the first I/O failure.
pub fn aggregate_decoded<R: Read>(
    mut decoder: Decoder<R>,
) -> Result<(FlightTelemetry, DecodeMetrics), DecodeError> {
    let mut aggregator = TelemetryAggregator::new();
    for record in decoder.by_ref() {
        aggregator.push(&record?);
    }
    let metrics = decoder.metrics();
    LogManager::new("aggregator").record(&format!(
        "aggregated {} records ({} unknown, {} unhandled, {} malformed messages skipped)",
        metrics.records_decoded,
        metrics.unknown_messages,
        metrics.unhandled_messages,
        metrics.malformed_messages
    ));
    Ok((aggregator.finish(), metrics))
}
