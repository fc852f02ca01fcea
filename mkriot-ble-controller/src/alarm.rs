//! Alarm clock operations
//!
//! The board keeps its own wall clock, so programming an alarm always pushes
//! the local time together with the alarm time.

use mkriot_proto::{AlarmConfig, Channel, ClockTime, Melody, Value, WireType, wire_to_editable};
use tracing::info;

use crate::Error;
use crate::central::Central;
use crate::observer::StatusLevel;
use crate::transport::Transport;

/// What the board currently has programmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSettings {
    pub time: ClockTime,
    /// Melody in note-name form, ready to be edited and sent back
    pub melody: String,
    pub enabled: bool,
}

impl<T: Transport> Central<T> {
    pub async fn set_alarm_enabled(&self, enabled: bool) -> Result<(), Error> {
        self.write(Channel::AlarmSwitch, &Value::Flag(enabled)).await
    }

    pub async fn alarm_enabled(&self) -> Result<bool, Error> {
        let value = self.read(Channel::AlarmSwitch).await?;
        value.as_flag().ok_or_else(|| unexpected(Channel::AlarmSwitch, &value))
    }

    pub async fn set_local_time(&self, time: ClockTime) -> Result<(), Error> {
        self.write(Channel::LocalTime, &Value::Time(time)).await
    }

    pub async fn set_alarm_time(&self, time: ClockTime) -> Result<(), Error> {
        self.write(Channel::AlarmTime, &Value::Time(time)).await
    }

    pub async fn alarm_time(&self) -> Result<ClockTime, Error> {
        let value = self.read(Channel::AlarmTime).await?;
        value.as_time().ok_or_else(|| unexpected(Channel::AlarmTime, &value))
    }

    pub async fn set_melody(&self, melody: &Melody) -> Result<(), Error> {
        self.write(Channel::Melody, &Value::Text(melody.to_wire())).await
    }

    /// The melody exactly as stored on the board (`freq@ms` steps)
    pub async fn melody_text(&self) -> Result<String, Error> {
        match self.read(Channel::Melody).await? {
            Value::Text(text) => Ok(text),
            other => Err(unexpected(Channel::Melody, &other)),
        }
    }

    /// Program and arm the alarm.
    ///
    /// The melody is encoded before anything is sent, so a melody the board
    /// cannot hold leaves every setting untouched. Local time and alarm time
    /// go out together, then the melody, then the alarm is switched on.
    pub async fn configure_alarm(&self, config: &AlarmConfig, now: ClockTime) -> Result<(), Error> {
        let melody = Value::Text(config.melody.to_wire());
        WireType::Text.encode(&melody)?;

        let (local, alarm) = tokio::join!(self.set_local_time(now), self.set_alarm_time(config.time));
        local?;
        alarm?;
        self.write(Channel::Melody, &melody).await?;
        self.set_alarm_enabled(true).await?;

        info!(time = %config.time, steps = config.melody.steps().len(), "alarm programmed");
        self.status(&format!("Alarm set for {}", config.time), StatusLevel::Ok);
        Ok(())
    }

    /// Validate operator input, then [`Central::configure_alarm`]
    pub async fn configure_alarm_text(&self, time: &str, melody: &str, now: ClockTime) -> Result<(), Error> {
        let config = AlarmConfig::parse(time, melody)?;
        self.configure_alarm(&config, now).await
    }

    /// Read the programmed alarm, with the melody converted to note names
    pub async fn read_settings(&self) -> Result<AlarmSettings, Error> {
        let result = async {
            let time = self.alarm_time().await?;
            let melody = wire_to_editable(&self.melody_text().await?);
            let enabled = self.alarm_enabled().await?;
            Ok::<_, Error>(AlarmSettings { time, melody, enabled })
        }
        .await;

        match &result {
            Ok(_) => self.status("Settings read from the board", StatusLevel::Ok),
            Err(err) => self.status(&format!("Could not read settings: {err}"), StatusLevel::Warn),
        }
        result
    }
}

fn unexpected(channel: Channel, value: &Value) -> Error {
    Error::UnexpectedValue {
        channel,
        found: value.kind(),
    }
}
