//! What the operator sees, rebuilt from controller events

use std::collections::HashMap;
use std::fmt::Write as _;

use mkriot_ble_controller::{CentralEvent, StatusLevel};
use mkriot_proto::{Channel, Profile, Value};

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub connected: bool,
    pub busy: bool,
    pub status: String,
    pub level: StatusLevel,
    pub telemetry: HashMap<Channel, Value>,
}

impl AppState {
    pub fn connecting() -> Self {
        Self {
            busy: true,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: CentralEvent) {
        match event {
            CentralEvent::Connected(connected) => {
                self.connected = connected;
                self.busy = false;
            }
            CentralEvent::Status { text, level } => {
                if level == StatusLevel::Warn {
                    self.busy = false;
                }
                self.status = text;
                self.level = level;
            }
            CentralEvent::Disconnected => {
                self.connected = false;
                self.busy = false;
                self.telemetry.clear();
            }
            CentralEvent::Value { channel, value } => {
                self.telemetry.insert(channel, value);
            }
        }
    }

    /// Status line followed by one row per telemetry channel of `profile`
    pub fn render(&self, profile: &Profile) -> String {
        let badge = match (self.connected, self.busy) {
            (true, _) => "connected",
            (false, true) => "busy",
            (false, false) => "offline",
        };
        let mut out = format!("[{badge}] {}\n", self.status);

        for spec in profile.telemetry() {
            let reading = self
                .telemetry
                .get(&spec.channel)
                .map(|value| format_reading(spec.channel, value))
                .unwrap_or_else(|| "--".to_string());
            let _ = writeln!(out, "  {:<12} {reading}", spec.channel.name());
        }
        out
    }
}

pub fn format_reading(channel: Channel, value: &Value) -> String {
    let number = match value {
        Value::Float(v) => format!("{v:.2}"),
        other => other.to_string(),
    };
    match unit(channel) {
        "" => number,
        unit => format!("{number} {unit}"),
    }
}

fn unit(channel: Channel) -> &'static str {
    match channel {
        Channel::Temperature => "°C",
        Channel::Humidity => "%",
        Channel::Pressure => "kPa",
        Channel::GyroX | Channel::GyroY | Channel::GyroZ => "°/s",
        Channel::AccelX | Channel::AccelY | Channel::AccelZ => "g",
        _ => "",
    }
}
