//! Seam between the central and the platform BLE stack
//!
//! [`Transport`] selects a device; [`Link`] is the opened connection to it.
//! The btleplug implementation lives in [`crate::btle`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use mkriot_proto::Profile;
use uuid::Uuid;

use crate::Error;

/// Which advertisements are acceptable when selecting a device
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    /// Any of these advertised services selects the device
    pub services: Vec<Uuid>,
    /// Exact advertised names accepted as a fallback
    pub names: Vec<String>,
    /// Advertised name prefixes accepted as a fallback
    pub name_prefixes: Vec<String>,
    /// Services the central needs access to once connected
    pub optional_services: Vec<Uuid>,
    /// Name or address substring; when set, only a matching device is selected
    pub target: Option<String>,
}

impl DiscoveryFilter {
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            services: vec![profile.service],
            names: profile.device_names.iter().map(|s| s.to_string()).collect(),
            name_prefixes: profile
                .device_name_prefixes
                .iter()
                .map(|s| s.to_string())
                .collect(),
            optional_services: profile.services(),
            target: None,
        }
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn matches(&self, name: Option<&str>, address: &str, advertised: &[Uuid]) -> bool {
        if let Some(target) = &self.target {
            return name.is_some_and(|n| n.contains(target.as_str())) || address.contains(target.as_str());
        }

        advertised.iter().any(|s| self.services.contains(s))
            || name.is_some_and(|n| {
                self.names.iter().any(|exact| exact == n)
                    || self.name_prefixes.iter().any(|p| n.starts_with(p.as_str()))
            })
    }
}

/// A GATT service and the characteristics it exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Resolved address of one characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicRef {
    pub service: Uuid,
    pub uuid: Uuid,
}

/// Something the link reports without being asked
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Notification { characteristic: Uuid, value: Vec<u8> },
    Disconnected,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Link: Link;

    /// Whether the platform has a usable BLE adapter
    async fn is_available(&self) -> bool;

    /// Pick one device matching the filter. Fails with
    /// [`Error::DeviceSelectionAborted`] when none is chosen.
    async fn request_device(&self, filter: &DiscoveryFilter) -> Result<Self::Link, Error>;
}

/// An opened (or openable) connection to one device
#[async_trait]
pub trait Link: Send + Sync + 'static {
    fn name(&self) -> Option<String>;

    async fn connect(&self) -> Result<(), Error>;

    async fn disconnect(&self) -> Result<(), Error>;

    async fn services(&self) -> Result<Vec<ServiceInfo>, Error>;

    async fn read(&self, characteristic: &CharacteristicRef) -> Result<Vec<u8>, Error>;

    /// Write with response
    async fn write(&self, characteristic: &CharacteristicRef, data: &[u8]) -> Result<(), Error>;

    async fn subscribe(&self, characteristic: &CharacteristicRef) -> Result<(), Error>;

    /// Notifications and disconnects, from now until the link goes away
    async fn events(&self) -> Result<BoxStream<'static, LinkEvent>, Error>;
}
