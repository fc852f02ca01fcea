//! MKR IoT Carrier protocol
//!
//! GATT profiles of the two carrier sketches, the little-endian value codec
//! used on their characteristics, and the text codecs for alarm melodies and
//! clock times. Nothing here performs I/O.

pub mod alarm;
pub mod ble;
pub mod melody;
pub mod note;
pub mod time;
pub mod wire;

pub use alarm::{AlarmConfig, ValidationError};
pub use ble::{ALARM_CLOCK, Access, Channel, ChannelSpec, Profile, SENSOR_CARRIER, ServiceRole};
pub use melody::{Melody, MelodyError, MelodyStep, wire_to_editable};
pub use time::{ClockTime, TimeError};
pub use wire::{DecodeError, EncodeError, LedCommand, MAX_TEXT_LEN, Value, WireType};
