//! Alarm settings as entered by the operator

use crate::melody::{Melody, MelodyError};
use crate::time::{ClockTime, TimeError};

/// Alarm time and melody, validated together before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmConfig {
    pub time: ClockTime,
    pub melody: Melody,
}

impl AlarmConfig {
    /// Validate operator input. The melody is checked first, so a bad melody
    /// is reported even when the time is also wrong.
    pub fn parse(time: &str, melody: &str) -> Result<Self, ValidationError> {
        let melody = Melody::parse(melody)?;
        let time = time.parse::<ClockTime>()?;
        Ok(Self { time, melody })
    }
}

/// Operator input that cannot be sent to the board
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Melody(#[from] MelodyError),
    #[error(transparent)]
    Time(#[from] TimeError),
}
