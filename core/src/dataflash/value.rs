use crate::dataflash::format::FieldType;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// A decoded field, kept in its raw stored form (no unit scaling applied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Array(Vec<i16>),
}

impl Value {
    /// Raw numeric value, `None` for text and array fields.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::UInt(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            Value::Text(_) | Value::Array(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v) => u64::try_from(v).ok(),
            Value::UInt(v) => Some(v),
            Value::Float(v) if v >= 0.0 && v.is_finite() => Some(v as u64),
            _ => None,
        }
    }

    /// Numeric value converted to physical units using the field's multiplier.
    pub fn physical(&self, field: FieldType) -> Option<f64> {
        let raw = self.as_f64()?;
        Some(match field.multiplier() {
            Some(multiplier) => raw * multiplier,
            None => raw,
        })
    }

    /// Decodes one field from exactly `field.size()` little-endian bytes.
    pub fn decode(field: FieldType, bytes: &[u8]) -> Value {
        match field {
            FieldType::I8 => Value::Int(i64::from(bytes[0] as i8)),
            FieldType::U8 | FieldType::FlightMode => Value::UInt(u64::from(bytes[0])),
            FieldType::I16 | FieldType::CentiI16 => {
                Value::Int(i64::from(i16::from_le_bytes([bytes[0], bytes[1]])))
            }
            FieldType::U16 | FieldType::CentiU16 => {
                Value::UInt(u64::from(u16::from_le_bytes([bytes[0], bytes[1]])))
            }
            FieldType::I32 | FieldType::CentiI32 | FieldType::LatLng => {
                Value::Int(i64::from(i32::from_le_bytes(le_array(bytes))))
            }
            FieldType::U32 | FieldType::CentiU32 => {
                Value::UInt(u64::from(u32::from_le_bytes(le_array(bytes))))
            }
            FieldType::I64 => Value::Int(i64::from_le_bytes(le_array(bytes))),
            FieldType::U64 => Value::UInt(u64::from_le_bytes(le_array(bytes))),
            FieldType::F32 => Value::Float(f64::from(f32::from_le_bytes(le_array(bytes)))),
            FieldType::F64 => Value::Float(f64::from_le_bytes(le_array(bytes))),
            FieldType::Char4 | FieldType::Char16 | FieldType::Char64 => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Value::Text(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            FieldType::I16Array32 => Value::Array(
                bytes
                    .chunks_exact(2)
                    .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                    .collect(),
            ),
        }
    }

    /// Encodes this value as `field`, rejecting values that do not fit.
    pub fn encode<W: Write>(&self, field: FieldType, out: &mut W) -> io::Result<()> {
        match field {
            FieldType::I8 => out.write_all(&self.integer::<i8>(field)?.to_le_bytes()),
            FieldType::U8 | FieldType::FlightMode => {
                out.write_all(&self.integer::<u8>(field)?.to_le_bytes())
            }
            FieldType::I16 | FieldType::CentiI16 => {
                out.write_all(&self.integer::<i16>(field)?.to_le_bytes())
            }
            FieldType::U16 | FieldType::CentiU16 => {
                out.write_all(&self.integer::<u16>(field)?.to_le_bytes())
            }
            FieldType::I32 | FieldType::CentiI32 | FieldType::LatLng => {
                out.write_all(&self.integer::<i32>(field)?.to_le_bytes())
            }
            FieldType::U32 | FieldType::CentiU32 => {
                out.write_all(&self.integer::<u32>(field)?.to_le_bytes())
            }
            FieldType::I64 => out.write_all(&self.integer::<i64>(field)?.to_le_bytes()),
            FieldType::U64 => out.write_all(&self.integer::<u64>(field)?.to_le_bytes()),
            FieldType::F32 => out.write_all(&(self.float(field)? as f32).to_le_bytes()),
            FieldType::F64 => out.write_all(&self.float(field)?.to_le_bytes()),
            FieldType::Char4 | FieldType::Char16 | FieldType::Char64 => {
                let Value::Text(text) = self else {
                    return Err(mismatch(field, self));
                };
                let mut padded = vec![0u8; field.size()];
                let len = text.len().min(padded.len());
                padded[..len].copy_from_slice(&text.as_bytes()[..len]);
                out.write_all(&padded)
            }
            FieldType::I16Array32 => {
                let Value::Array(items) = self else {
                    return Err(mismatch(field, self));
                };
                let mut padded = [0i16; 32];
                for (slot, item) in padded.iter_mut().zip(items) {
                    *slot = *item;
                }
                padded
                    .iter()
                    .try_for_each(|item| out.write_all(&item.to_le_bytes()))
            }
        }
    }

    fn integer<T>(&self, field: FieldType) -> io::Result<T>
    where
        T: TryFrom<i64> + TryFrom<u64>,
    {
        let converted = match *self {
            Value::Int(v) => <T as TryFrom<i64>>::try_from(v).ok(),
            Value::UInt(v) => <T as TryFrom<u64>>::try_from(v).ok(),
            _ => None,
        };
        converted.ok_or_else(|| mismatch(field, self))
    }

    fn float(&self, field: FieldType) -> io::Result<f64> {
        self.as_f64().ok_or_else(|| mismatch(field, self))
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

fn mismatch(field: FieldType, value: &Value) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("value {:?} cannot be encoded as '{}'", value, field.code()),
    )
}
