//! Fixed-width value encoding used on every characteristic
//!
//! All multi-byte numbers are little-endian. Text has no length prefix; the
//! characteristic value boundary delimits it.

use std::fmt;

use crate::time::ClockTime;

/// Largest text payload the firmware accepts on a characteristic
pub const MAX_TEXT_LEN: usize = 512;

/// Wire shape of a characteristic value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// IEEE-754 single precision
    Float,
    /// Two's-complement signed 32-bit
    Int32,
    /// One byte, 0 or 1
    Flag,
    /// Hour byte then minute byte
    TimePair,
    /// LED index followed by R, G, B
    LedCommand,
    /// UTF-8, up to [`MAX_TEXT_LEN`] bytes
    Text,
}

impl WireType {
    /// Encoded length, `None` for variable-length text
    pub fn size(&self) -> Option<usize> {
        match self {
            WireType::Float | WireType::Int32 | WireType::LedCommand => Some(4),
            WireType::Flag => Some(1),
            WireType::TimePair => Some(2),
            WireType::Text => None,
        }
    }

    /// Encode a value for this wire type.
    ///
    /// Numeric values are coerced between float, integer and flag: floats are
    /// truncated and saturated into `i32`, any non-zero number is a set flag.
    /// Structured values and text only encode to their own type.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mismatch = || EncodeError::TypeMismatch {
            expected: *self,
            found: value.kind(),
        };

        match (self, value) {
            (WireType::Float, Value::Float(v)) => Ok(v.to_le_bytes().to_vec()),
            (WireType::Float, Value::Int(v)) => Ok((*v as f32).to_le_bytes().to_vec()),
            (WireType::Int32, Value::Int(v)) => Ok(v.to_le_bytes().to_vec()),
            // `as` truncates toward zero, saturates, and maps NaN to 0
            (WireType::Int32, Value::Float(v)) => Ok((*v as i32).to_le_bytes().to_vec()),
            (WireType::Int32, Value::Flag(v)) => Ok(i32::from(*v).to_le_bytes().to_vec()),
            (WireType::Flag, Value::Flag(v)) => Ok(vec![u8::from(*v)]),
            (WireType::Flag, Value::Int(v)) => Ok(vec![u8::from(*v != 0)]),
            (WireType::Flag, Value::Float(v)) => Ok(vec![u8::from(*v != 0.0 && !v.is_nan())]),
            (WireType::TimePair, Value::Time(t)) => Ok(t.to_bytes().to_vec()),
            (WireType::LedCommand, Value::Led(cmd)) => Ok(cmd.to_bytes().to_vec()),
            (WireType::Text, Value::Text(text)) => {
                if text.len() > MAX_TEXT_LEN {
                    return Err(EncodeError::TextTooLong { len: text.len() });
                }
                Ok(text.as_bytes().to_vec())
            }
            _ => Err(mismatch()),
        }
    }

    /// Decode a characteristic value. Bytes past the fixed width are ignored.
    pub fn decode(&self, data: &[u8]) -> Result<Value, DecodeError> {
        if let Some(size) = self.size() {
            if data.len() < size {
                return Err(DecodeError::TooShort {
                    wire: *self,
                    expected: size,
                    actual: data.len(),
                });
            }
        }

        match self {
            WireType::Float => Ok(Value::Float(f32::from_le_bytes([
                data[0], data[1], data[2], data[3],
            ]))),
            WireType::Int32 => Ok(Value::Int(i32::from_le_bytes([
                data[0], data[1], data[2], data[3],
            ]))),
            WireType::Flag => Ok(Value::Flag(data[0] != 0)),
            WireType::TimePair => ClockTime::from_bytes(data).map(Value::Time),
            WireType::LedCommand => LedCommand::from_bytes(data).map(Value::Led),
            WireType::Text => std::str::from_utf8(data)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|_| DecodeError::InvalidUtf8),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WireType::Float => "float32",
            WireType::Int32 => "int32",
            WireType::Flag => "flag",
            WireType::TimePair => "time",
            WireType::LedCommand => "led command",
            WireType::Text => "text",
        })
    }
}

/// A decoded characteristic value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Int(i32),
    Flag(bool),
    Time(ClockTime),
    Led(LedCommand),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "integer",
            Value::Flag(_) => "flag",
            Value::Time(_) => "time",
            Value::Led(_) => "led command",
            Value::Text(_) => "text",
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<ClockTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v:.2}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Flag(v) => f.write_str(if *v { "on" } else { "off" }),
            Value::Time(t) => write!(f, "{t}"),
            Value::Led(cmd) => write!(
                f,
                "led {} #{:02x}{:02x}{:02x}",
                cmd.index, cmd.red, cmd.green, cmd.blue
            ),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// LED command: which pixel, and its colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCommand {
    pub index: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl LedCommand {
    /// Build a command from loosely-typed channel values, keeping the low
    /// eight bits of each colour component.
    pub fn masked(index: u8, red: i32, green: i32, blue: i32) -> Self {
        Self {
            index,
            red: (red & 0xff) as u8,
            green: (green & 0xff) as u8,
            blue: (blue & 0xff) as u8,
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.index, self.red, self.green, self.blue]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        match data {
            [index, red, green, blue, ..] => Ok(Self {
                index: *index,
                red: *red,
                green: *green,
                blue: *blue,
            }),
            _ => Err(DecodeError::TooShort {
                wire: WireType::LedCommand,
                expected: 4,
                actual: data.len(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot encode a {found} value as {expected}")]
    TypeMismatch { expected: WireType, found: &'static str },
    #[error("text of {len} bytes exceeds the {} byte limit", MAX_TEXT_LEN)]
    TextTooLong { len: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{wire} value needs {expected} bytes, got {actual}")]
    TooShort {
        wire: WireType,
        expected: usize,
        actual: usize,
    },
    #[error("time {hour}:{minute:02} is out of range")]
    TimeOutOfRange { hour: u8, minute: u8 },
    #[error("text value is not valid UTF-8")]
    InvalidUtf8,
}
