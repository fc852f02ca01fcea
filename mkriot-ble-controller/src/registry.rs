//! Resolves a profile's channels against the services a device exposes

use std::collections::HashMap;

use mkriot_proto::{Channel, Profile, ServiceRole};
use tracing::debug;
use uuid::Uuid;

use crate::Error;
use crate::transport::{CharacteristicRef, ServiceInfo};

/// Characteristic handles for every channel of a profile
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handles: HashMap<Channel, CharacteristicRef>,
}

impl Registry {
    /// Resolve every channel of `profile`.
    ///
    /// A missing service fails with the list of services that are present;
    /// a missing characteristic fails naming its channel.
    pub fn resolve(profile: &Profile, services: &[ServiceInfo]) -> Result<Self, Error> {
        for service in services {
            debug!(service = %service.uuid, characteristics = service.characteristics.len(), "device service");
        }

        let find = |uuid: Uuid| {
            services
                .iter()
                .find(|s| s.uuid == uuid)
                .ok_or_else(|| Error::ServiceNotFound {
                    service: uuid,
                    available: services.iter().map(|s| s.uuid).collect(),
                })
        };

        let primary = find(profile.service)?;
        let control = profile.control_service.map(find).transpose()?;

        let mut handles = HashMap::with_capacity(profile.channels.len());
        for spec in profile.channels {
            let service = match spec.service {
                ServiceRole::Primary => Some(primary),
                ServiceRole::Control => control,
            };
            let present = service.is_some_and(|s| s.characteristics.contains(&spec.uuid));
            let Some(service) = service.filter(|_| present) else {
                return Err(Error::CharacteristicUnavailable {
                    channel: spec.channel,
                    uuid: spec.uuid,
                });
            };
            handles.insert(
                spec.channel,
                CharacteristicRef {
                    service: service.uuid,
                    uuid: spec.uuid,
                },
            );
        }

        Ok(Self { handles })
    }

    pub fn get(&self, channel: Channel) -> Option<&CharacteristicRef> {
        self.handles.get(&channel)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
