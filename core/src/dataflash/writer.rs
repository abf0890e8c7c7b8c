use crate::dataflash::format::{FieldType, MessageFormat, RecordKind, FMT_TYPE, HEAD1, HEAD2};
use crate::dataflash::record::{Record, MOTOR_COUNT};
use crate::dataflash::value::Value;
use std::collections::HashSet;
use std::io::{self, Write};

pub const GPS_TYPE: u8 = 10;
pub const BARO_TYPE: u8 = 20;
pub const RCOU_TYPE: u8 = 30;
pub const VIBE_TYPE: u8 = 40;
pub const BAT_TYPE: u8 = 50;

/// Layout the writer uses for each record kind.
pub fn standard_format(kind: RecordKind) -> MessageFormat {
    use FieldType::{CentiI16, F32, U16, U64, U8};
    match kind {
        RecordKind::Battery => layout(
            kind,
            BAT_TYPE,
            &[U64, U8, F32, F32],
            &["TimeUS", "Inst", "Volt", "Curr"],
        ),
        RecordKind::Vibration => layout(
            kind,
            VIBE_TYPE,
            &[U64, U8, F32, F32, F32],
            &["TimeUS", "IMU", "VibeX", "VibeY", "VibeZ"],
        ),
        RecordKind::Gps => layout(
            kind,
            GPS_TYPE,
            &[U64, U8, CentiI16],
            &["TimeUS", "Status", "HDop"],
        ),
        RecordKind::MotorOutput => layout(
            kind,
            RCOU_TYPE,
            &[U64, U16, U16, U16, U16],
            &["TimeUS", "C1", "C2", "C3", "C4"],
        ),
        RecordKind::Barometer => {
            layout(kind, BARO_TYPE, &[U64, U8, F32], &["TimeUS", "I", "Alt"])
        }
    }
}

fn layout(kind: RecordKind, type_id: u8, fields: &[FieldType], labels: &[&str]) -> MessageFormat {
    MessageFormat {
        type_id,
        name: kind.message_name().to_string(),
        fields: fields.to_vec(),
        labels: labels.iter().map(|label| label.to_string()).collect(),
        kind: Some(kind),
    }
}

/// Emits DataFlash messages, declaring each format before its first use.
pub struct LogWriter<W> {
    inner: W,
    declared: HashSet<u8>,
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            declared: HashSet::new(),
        }
    }

    pub fn write_format(&mut self, format: &MessageFormat) -> io::Result<()> {
        self.inner.write_all(&[HEAD1, HEAD2, FMT_TYPE])?;
        self.inner.write_all(&format.to_fmt_payload())?;
        self.declared.insert(format.type_id);
        Ok(())
    }

    /// Writes one message; the whole message is encoded before anything is
    /// written so a rejected value never leaves a partial message behind.
    pub fn write_message(&mut self, format: &MessageFormat, values: &[Value]) -> io::Result<()> {
        if values.len() != format.fields.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} expects {} values, got {}",
                    format.name,
                    format.fields.len(),
                    values.len()
                ),
            ));
        }

        let mut message = Vec::with_capacity(format.message_len());
        message.extend_from_slice(&[HEAD1, HEAD2, format.type_id]);
        for (field, value) in format.fields.iter().zip(values) {
            value.encode(*field, &mut message)?;
        }

        if !self.declared.contains(&format.type_id) {
            self.write_format(format)?;
        }
        self.inner.write_all(&message)
    }

    /// Writes a record using its standard layout. Battery records carry their
    /// own timestamp; `time_us` stamps every other kind.
    pub fn write_record(&mut self, time_us: u64, record: &Record) -> io::Result<()> {
        let format = standard_format(record.kind());
        let values = match record {
            Record::Battery(bat) => vec![
                Value::UInt(bat.time_us),
                Value::UInt(0),
                Value::Float(bat.voltage),
                Value::Float(bat.current),
            ],
            Record::Vibration(vibe) => vec![
                Value::UInt(time_us),
                Value::UInt(0),
                Value::Float(vibe.vibe_x),
                Value::Float(vibe.vibe_y),
                Value::Float(vibe.vibe_z),
            ],
            Record::Gps(gps) => vec![
                Value::UInt(time_us),
                Value::UInt(3),
                Value::Int(gps.hdop_raw.round() as i64),
            ],
            Record::MotorOutput(rcou) => {
                let mut values = Vec::with_capacity(MOTOR_COUNT + 1);
                values.push(Value::UInt(time_us));
                values.extend(
                    rcou.channels
                        .iter()
                        .map(|pwm| Value::UInt(pwm.map_or(0, |pwm| pwm.round() as u64))),
                );
                values
            }
            Record::Barometer(baro) => vec![
                Value::UInt(time_us),
                Value::UInt(0),
                Value::Float(baro.altitude),
            ],
        };
        self.write_message(&format, &values)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflash::format::FMT_PAYLOAD_LEN;
    use crate::dataflash::record::BarometerRecord;

    #[test]
    fn format_is_declared_once() {
        let mut writer = LogWriter::new(Vec::new());
        let baro = Record::Barometer(BarometerRecord { altitude: 12.5 });
        writer.write_record(0, &baro).unwrap();
        writer.write_record(1, &baro).unwrap();
        let bytes = writer.into_inner();

        let message_len = standard_format(RecordKind::Barometer).message_len();
        assert_eq!(bytes.len(), 3 + FMT_PAYLOAD_LEN + 2 * message_len);
        assert_eq!(&bytes[..3], &[HEAD1, HEAD2, FMT_TYPE]);
    }

    #[test]
    fn value_count_mismatch_writes_nothing() {
        let mut writer = LogWriter::new(Vec::new());
        let format = standard_format(RecordKind::Barometer);
        let err = writer
            .write_message(&format, &[Value::UInt(0)])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn standard_formats_are_valid_definitions() {
        for kind in RecordKind::ALL {
            let format = standard_format(kind);
            let parsed = MessageFormat::from_fmt_payload(&format.to_fmt_payload()).unwrap();
            assert_eq!(parsed, format);
        }
    }
}
