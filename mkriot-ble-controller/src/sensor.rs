//! Actuator commands for the sensor carrier

use std::fmt;
use std::str::FromStr;

use mkriot_proto::{Channel, LedCommand, Value};

use crate::Error;
use crate::central::Central;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    One,
    Two,
}

impl Relay {
    pub fn channel(self) -> Channel {
        match self {
            Relay::One => Channel::Relay1,
            Relay::Two => Channel::Relay2,
        }
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relay::One => "1",
            Relay::Two => "2",
        })
    }
}

impl FromStr for Relay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Relay::One),
            "2" => Ok(Relay::Two),
            other => Err(format!("unknown relay {other:?}, expected 1 or 2")),
        }
    }
}

impl<T: Transport> Central<T> {
    pub async fn set_relay(&self, relay: Relay, on: bool) -> Result<(), Error> {
        self.write(relay.channel(), &Value::Flag(on)).await
    }

    /// Drive the buzzer at `frequency` Hz, 0 silences it.
    ///
    /// The fractional part is dropped; NaN writes 0.
    pub async fn set_buzzer(&self, frequency: f64) -> Result<(), Error> {
        self.write(Channel::Buzzer, &Value::Int(frequency as i32)).await
    }

    pub async fn set_led(&self, command: LedCommand) -> Result<(), Error> {
        self.write(Channel::Led, &Value::Led(command)).await
    }
}
