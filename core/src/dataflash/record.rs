use crate::dataflash::format::{FieldType, MessageFormat, RecordKind};
use crate::dataflash::value::Value;
use serde::{Deserialize, Serialize};

pub const MOTOR_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryRecord {
    pub time_us: u64,
    /// Volts.
    pub voltage: f64,
    /// Amps.
    pub current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VibrationRecord {
    pub vibe_x: f64,
    pub vibe_y: f64,
    pub vibe_z: f64,
}

impl VibrationRecord {
    /// Euclidean norm of the three axis levels.
    pub fn magnitude(&self) -> f64 {
        (self.vibe_x * self.vibe_x + self.vibe_y * self.vibe_y + self.vibe_z * self.vibe_z).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsRecord {
    /// HDOP in hundredths.
    pub hdop_raw: f64,
}

impl GpsRecord {
    pub fn hdop(&self) -> f64 {
        self.hdop_raw / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorOutputRecord {
    /// PWM per motor; `None` when the channel is absent or zero.
    pub channels: [Option<f64>; MOTOR_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarometerRecord {
    /// Meters.
    pub altitude: f64,
}

/// A decoded log message the analysis understands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Battery(BatteryRecord),
    Vibration(VibrationRecord),
    Gps(GpsRecord),
    MotorOutput(MotorOutputRecord),
    Barometer(BarometerRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Battery(_) => RecordKind::Battery,
            Record::Vibration(_) => RecordKind::Vibration,
            Record::Gps(_) => RecordKind::Gps,
            Record::MotorOutput(_) => RecordKind::MotorOutput,
            Record::Barometer(_) => RecordKind::Barometer,
        }
    }

    /// Builds the typed record for a decoded message.
    ///
    /// Returns `None` when the message is not one of the five handled kinds or
    /// lacks a field the kind requires.
    pub fn from_message(format: &MessageFormat, values: &[Value]) -> Option<Record> {
        let fields = Fields { format, values };
        let record = match format.kind? {
            RecordKind::Battery => Record::Battery(BatteryRecord {
                time_us: fields.time_us()?,
                voltage: fields.physical("Volt")?,
                current: fields.physical("Curr")?,
            }),
            RecordKind::Vibration => Record::Vibration(VibrationRecord {
                vibe_x: fields.physical("VibeX")?,
                vibe_y: fields.physical("VibeY")?,
                vibe_z: fields.physical("VibeZ")?,
            }),
            RecordKind::Gps => {
                let (field, value) = fields.get("HDop")?;
                let raw = value.as_f64()?;
                // Integer encodings already store hundredths.
                let hdop_raw = if field.is_float() { raw * 100.0 } else { raw };
                Record::Gps(GpsRecord { hdop_raw })
            }
            RecordKind::MotorOutput => {
                let mut channels = [None; MOTOR_COUNT];
                for (index, slot) in channels.iter_mut().enumerate() {
                    *slot = fields
                        .physical(&format!("C{}", index + 1))
                        .filter(|&pwm| pwm != 0.0);
                }
                Record::MotorOutput(MotorOutputRecord { channels })
            }
            RecordKind::Barometer => Record::Barometer(BarometerRecord {
                altitude: fields.physical("Alt")?,
            }),
        };
        Some(record)
    }
}

struct Fields<'a> {
    format: &'a MessageFormat,
    values: &'a [Value],
}

impl<'a> Fields<'a> {
    fn get(&self, label: &str) -> Option<(FieldType, &'a Value)> {
        let index = self.format.field_index(label)?;
        Some((*self.format.fields.get(index)?, self.values.get(index)?))
    }

    fn physical(&self, label: &str) -> Option<f64> {
        let (field, value) = self.get(label)?;
        value.physical(field)
    }

    fn time_us(&self) -> Option<u64> {
        if let Some((_, value)) = self.get("TimeUS") {
            return value.as_u64();
        }
        let (_, value) = self.get("TimeMS")?;
        value.as_u64()?.checked_mul(1_000)
    }
}
