//! Clock time as entered by the operator (`HH:MM`) and as stored on the board

use std::fmt;
use std::str::FromStr;

use crate::wire::DecodeError;

pub const MAX_HOUR: u8 = 23;
pub const MAX_MINUTE: u8 = 59;

/// Hour and minute of a 24-hour clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, TimeError> {
        if hour > MAX_HOUR || minute > MAX_MINUTE {
            return Err(TimeError::OutOfRange { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [self.hour, self.minute]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        match data {
            [hour, minute, ..] => Self::new(*hour, *minute).map_err(|_| {
                DecodeError::TimeOutOfRange {
                    hour: *hour,
                    minute: *minute,
                }
            }),
            _ => Err(DecodeError::TooShort {
                wire: crate::wire::WireType::TimePair,
                expected: 2,
                actual: data.len(),
            }),
        }
    }
}

/// Accepts `H:MM` or `HH:MM`, surrounding whitespace allowed
impl FromStr for ClockTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || TimeError::Format {
            input: s.to_string(),
        };

        let (hour, minute) = s.trim().split_once(':').ok_or_else(format_error)?;
        let digits = |part: &str, len: std::ops::RangeInclusive<usize>| {
            len.contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
        };
        if !digits(hour, 1..=2) || !digits(minute, 2..=2) {
            return Err(format_error());
        }

        // at most two ASCII digits each, so these always fit in a u8
        let hour: u8 = hour.parse().map_err(|_| format_error())?;
        let minute: u8 = minute.parse().map_err(|_| format_error())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("invalid time \"{input}\", use the HH:MM format")]
    Format { input: String },
    #[error("time {hour}:{minute:02} is out of range")]
    OutOfRange { hour: u8, minute: u8 },
}
