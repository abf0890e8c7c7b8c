use serde::{Deserialize, Serialize};

/// First sync byte of every DataFlash message.
pub const HEAD1: u8 = 0xA3;
/// Second sync byte of every DataFlash message.
pub const HEAD2: u8 = 0x95;
/// Type id of the self-describing FMT message.
pub const FMT_TYPE: u8 = 0x80;
pub const HEADER_LEN: usize = 3;
/// FMT payload: type, length, name[4], format[16], labels[64].
pub const FMT_PAYLOAD_LEN: usize = 1 + 1 + 4 + 16 + 64;
/// Field layout of the FMT message, as logs declare it for themselves.
pub const FMT_FORMAT: &str = "BBnNZ";

const NAME_LEN: usize = 4;
const FORMAT_LEN: usize = 16;
const LABELS_LEN: usize = 64;

/// Wire encoding of a single field, keyed by its DataFlash format character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char4,
    Char16,
    Char64,
    I16Array32,
    CentiI16,
    CentiU16,
    CentiI32,
    CentiU32,
    LatLng,
    FlightMode,
}

impl FieldType {
    pub fn from_code(code: char) -> Option<Self> {
        let field = match code {
            'b' => Self::I8,
            'B' => Self::U8,
            'h' => Self::I16,
            'H' => Self::U16,
            'i' => Self::I32,
            'I' => Self::U32,
            'q' => Self::I64,
            'Q' => Self::U64,
            'f' => Self::F32,
            'd' => Self::F64,
            'n' => Self::Char4,
            'N' => Self::Char16,
            'Z' => Self::Char64,
            'a' => Self::I16Array32,
            'c' => Self::CentiI16,
            'C' => Self::CentiU16,
            'e' => Self::CentiI32,
            'E' => Self::CentiU32,
            'L' => Self::LatLng,
            'M' => Self::FlightMode,
            _ => return None,
        };
        Some(field)
    }

    pub fn code(self) -> char {
        match self {
            Self::I8 => 'b',
            Self::U8 => 'B',
            Self::I16 => 'h',
            Self::U16 => 'H',
            Self::I32 => 'i',
            Self::U32 => 'I',
            Self::I64 => 'q',
            Self::U64 => 'Q',
            Self::F32 => 'f',
            Self::F64 => 'd',
            Self::Char4 => 'n',
            Self::Char16 => 'N',
            Self::Char64 => 'Z',
            Self::I16Array32 => 'a',
            Self::CentiI16 => 'c',
            Self::CentiU16 => 'C',
            Self::CentiI32 => 'e',
            Self::CentiU32 => 'E',
            Self::LatLng => 'L',
            Self::FlightMode => 'M',
        }
    }

    /// Encoded width in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 | Self::FlightMode => 1,
            Self::I16 | Self::U16 | Self::CentiI16 | Self::CentiU16 => 2,
            Self::I32
            | Self::U32
            | Self::F32
            | Self::CentiI32
            | Self::CentiU32
            | Self::LatLng
            | Self::Char4 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::Char16 => 16,
            Self::Char64 | Self::I16Array32 => 64,
        }
    }

    /// Factor turning the raw stored integer into physical units.
    pub fn multiplier(self) -> Option<f64> {
        match self {
            Self::CentiI16 | Self::CentiU16 | Self::CentiI32 | Self::CentiU32 => Some(0.01),
            Self::LatLng => Some(1e-7),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// The five message kinds the analysis consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Battery,
    Vibration,
    Gps,
    MotorOutput,
    Barometer,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Battery,
        RecordKind::Vibration,
        RecordKind::Gps,
        RecordKind::MotorOutput,
        RecordKind::Barometer,
    ];

    pub fn from_message_name(name: &str) -> Option<Self> {
        match name {
            "BAT" => Some(Self::Battery),
            "VIBE" => Some(Self::Vibration),
            "GPS" => Some(Self::Gps),
            "RCOU" => Some(Self::MotorOutput),
            "BARO" => Some(Self::Barometer),
            _ => None,
        }
    }

    pub fn message_name(self) -> &'static str {
        match self {
            Self::Battery => "BAT",
            Self::Vibration => "VIBE",
            Self::Gps => "GPS",
            Self::MotorOutput => "RCOU",
            Self::Barometer => "BARO",
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("message {name}: unknown format character '{code}'")]
    UnknownFieldType { name: String, code: char },
    #[error("message {name}: declared length {declared} but fields need {computed}")]
    LengthMismatch {
        name: String,
        declared: usize,
        computed: usize,
    },
    #[error("message {name}: {labels} labels for {fields} fields")]
    LabelCount {
        name: String,
        labels: usize,
        fields: usize,
    },
    #[error("message {name}: type id {type_id:#04x} is reserved")]
    ReservedType { name: String, type_id: u8 },
    #[error("message {name}: {what} does not fit in {limit} bytes")]
    TooLong {
        name: String,
        what: &'static str,
        limit: usize,
    },
}

/// Layout of one message type as declared by a FMT message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageFormat {
    pub type_id: u8,
    pub name: String,
    pub fields: Vec<FieldType>,
    pub labels: Vec<String>,
    pub kind: Option<RecordKind>,
}

impl MessageFormat {
    /// Builds a format from its textual FMT description, e.g.
    /// `MessageFormat::new(50, "BAT", "Qff", "TimeUS,Volt,Curr")`.
    pub fn new(type_id: u8, name: &str, format: &str, labels: &str) -> Result<Self, FormatError> {
        if type_id == FMT_TYPE {
            return Err(FormatError::ReservedType {
                name: name.to_string(),
                type_id,
            });
        }
        if name.len() > NAME_LEN {
            return Err(too_long(name, "name", NAME_LEN));
        }
        if format.len() > FORMAT_LEN {
            return Err(too_long(name, "format", FORMAT_LEN));
        }
        if labels.len() > LABELS_LEN {
            return Err(too_long(name, "labels", LABELS_LEN));
        }

        let fields = format
            .chars()
            .map(|code| {
                FieldType::from_code(code).ok_or_else(|| FormatError::UnknownFieldType {
                    name: name.to_string(),
                    code,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let labels: Vec<String> = if labels.is_empty() {
            Vec::new()
        } else {
            labels.split(',').map(|label| label.trim().to_string()).collect()
        };
        if labels.len() != fields.len() {
            return Err(FormatError::LabelCount {
                name: name.to_string(),
                labels: labels.len(),
                fields: fields.len(),
            });
        }

        let format = Self {
            type_id,
            name: name.to_string(),
            fields,
            labels,
            kind: RecordKind::from_message_name(name),
        };
        if format.message_len() > usize::from(u8::MAX) {
            return Err(too_long(name, "message", usize::from(u8::MAX)));
        }
        Ok(format)
    }

    /// Parses the 86-byte payload of a FMT message.
    pub fn from_fmt_payload(payload: &[u8; FMT_PAYLOAD_LEN]) -> Result<Self, FormatError> {
        let type_id = payload[0];
        let declared = payload[1] as usize;
        let name = nul_terminated(&payload[2..2 + NAME_LEN]);
        let format = nul_terminated(&payload[6..6 + FORMAT_LEN]);
        let labels = nul_terminated(&payload[22..22 + LABELS_LEN]);

        let parsed = Self::new(type_id, &name, &format, &labels)?;
        let computed = parsed.message_len();
        if computed != declared {
            return Err(FormatError::LengthMismatch {
                name,
                declared,
                computed,
            });
        }
        Ok(parsed)
    }

    /// True when `payload` is the FMT message describing FMT itself, which
    /// logs emit first. It carries no new layout.
    pub fn is_fmt_self_description(payload: &[u8; FMT_PAYLOAD_LEN]) -> bool {
        payload[0] == FMT_TYPE
            && usize::from(payload[1]) == HEADER_LEN + FMT_PAYLOAD_LEN
            && nul_terminated(&payload[6..6 + FORMAT_LEN]) == FMT_FORMAT
    }

    /// Encodes this format as a FMT payload.
    pub fn to_fmt_payload(&self) -> [u8; FMT_PAYLOAD_LEN] {
        let mut payload = [0u8; FMT_PAYLOAD_LEN];
        payload[0] = self.type_id;
        payload[1] = u8::try_from(self.message_len()).unwrap_or(u8::MAX);
        copy_padded(&mut payload[2..2 + NAME_LEN], self.name.as_bytes());
        let format: String = self.fields.iter().map(|field| field.code()).collect();
        copy_padded(&mut payload[6..6 + FORMAT_LEN], format.as_bytes());
        copy_padded(
            &mut payload[22..22 + LABELS_LEN],
            self.labels.join(",").as_bytes(),
        );
        payload
    }

    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|field| field.size()).sum()
    }

    /// Total on-disk length, header included.
    pub fn message_len(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }

    pub fn field_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|candidate| candidate == label)
    }
}

fn too_long(name: &str, what: &'static str, limit: usize) -> FormatError {
    FormatError::TooLong {
        name: name.to_string(),
        what,
        limit,
    }
}

fn nul_terminated(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn copy_padded(dest: &mut [u8], src: &[u8]) {
    let len = src.len().min(dest.len());
    dest[..len].copy_from_slice(&src[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_payload_is_self_describing() {
        let format = MessageFormat::new(50, "BAT", "QBff", "TimeUS,Inst,Volt,Curr").unwrap();
        assert_eq!(format.payload_len(), 8 + 1 + 4 + 4);
        assert_eq!(format.kind, Some(RecordKind::Battery));

        let parsed = MessageFormat::from_fmt_payload(&format.to_fmt_payload()).unwrap();
        assert_eq!(parsed, format);
        assert_eq!(parsed.field_index("Volt"), Some(2));
    }

    #[test]
    fn unknown_format_character_is_rejected() {
        let err = MessageFormat::new(51, "XYZ", "Qx", "TimeUS,Foo").unwrap_err();
        assert_eq!(
            err,
            FormatError::UnknownFieldType {
                name: "XYZ".into(),
                code: 'x'
            }
        );
    }

    #[test]
    fn declared_length_must_match_fields() {
        let format = MessageFormat::new(52, "BARO", "Qf", "TimeUS,Alt").unwrap();
        let mut payload = format.to_fmt_payload();
        payload[1] += 2;
        assert!(matches!(
            MessageFormat::from_fmt_payload(&payload),
            Err(FormatError::LengthMismatch { computed: 15, declared: 17, .. })
        ));
    }

    #[test]
    fn label_count_must_match_fields() {
        assert!(matches!(
            MessageFormat::new(53, "VIBE", "Qfff", "TimeUS,VibeX"),
            Err(FormatError::LabelCount { labels: 2, fields: 4, .. })
        ));
    }

    #[test]
    fn fmt_describing_itself_is_recognised() {
        let mut payload = [0u8; FMT_PAYLOAD_LEN];
        payload[0] = FMT_TYPE;
        payload[1] = 89;
        copy_padded(&mut payload[2..6], b"FMT");
        copy_padded(&mut payload[6..22], FMT_FORMAT.as_bytes());
        copy_padded(&mut payload[22..], b"Type,Length,Name,Format,Columns");
        assert!(MessageFormat::is_fmt_self_description(&payload));

        payload[1] = 90;
        assert!(!MessageFormat::is_fmt_self_description(&payload));
    }

    #[test]
    fn unmapped_messages_have_no_record_kind() {
        let format = MessageFormat::new(54, "PARM", "QNf", "TimeUS,Name,Value").unwrap();
        assert_eq!(format.kind, None);
        assert_eq!(FieldType::CentiU16.multiplier(), Some(0.01));
        assert_eq!(FieldType::Char16.size(), 16);
    }
}
