//! ArduPilot DataFlash (`.BIN`) log decoding.
//!
//! Every message starts with a two-byte sync marker and a type id. The layout
//! of each type is declared in-band by FMT messages, so the decoder learns the
//! schema while it reads.

pub mod decoder;
pub mod format;
pub mod record;
pub mod value;
pub mod writer;

pub use decoder::Decoder;
pub use format::{FieldType, FormatError, MessageFormat, RecordKind};
pub use record::{
    BarometerRecord, BatteryRecord, GpsRecord, MotorOutputRecord, Record, VibrationRecord,
    MOTOR_COUNT,
};
pub use value::Value;
pub use writer::{standard_format, LogWriter};
