//! MKR IoT Carrier BLE Controller
//!
//! BLE central for the carrier's sensor and alarm-clock firmwares: selects a
//! board, resolves its characteristics, streams telemetry to an [`Observer`]
//! and offers typed reads and writes on top.
//!
//! # Example
//!
//! ```ignore
//! use mkriot_ble_controller::{BtleTransport, Central, Relay, event_channel};
//! use mkriot_proto::SENSOR_CARRIER;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (observer, mut events) = event_channel();
//!     let central = Central::new(BtleTransport::default(), &SENSOR_CARRIER, observer);
//!
//!     central.connect().await?;
//!     central.set_relay(Relay::One, true).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod btle;
pub mod central;
mod error;
pub mod notify;
pub mod observer;
pub mod registry;
pub mod sensor;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use alarm::AlarmSettings;
pub use btle::{BtleTransport, DiscoveredDevice};
pub use central::{Central, ConnectionState};
pub use error::{BoxError, Error};
pub use observer::{CentralEvent, EventSender, NoopObserver, Observer, StatusLevel, event_channel};
pub use sensor::Relay;
pub use transport::{DiscoveryFilter, Link, LinkEvent, Transport};
