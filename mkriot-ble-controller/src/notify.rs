//! Routes pushed characteristic values to typed channel updates

use std::collections::HashMap;

use mkriot_proto::{Channel, DecodeError, Profile, Value, WireType};
use uuid::Uuid;

use crate::registry::Registry;

/// Decoder table for the subscribed channels of one connection
#[derive(Debug, Clone, Default)]
pub struct Multiplexer {
    routes: HashMap<Uuid, (Channel, WireType)>,
}

impl Multiplexer {
    /// Route every notifying channel of `profile` that `registry` resolved
    pub fn new(profile: &Profile, registry: &Registry) -> Self {
        let routes = profile
            .telemetry()
            .filter_map(|spec| {
                registry
                    .get(spec.channel)
                    .map(|handle| (handle.uuid, (spec.channel, spec.wire)))
            })
            .collect();
        Self { routes }
    }

    /// Decode a pushed value. `None` when the characteristic is not routed.
    pub fn dispatch(
        &self,
        characteristic: Uuid,
        data: &[u8],
    ) -> Option<(Channel, Result<Value, DecodeError>)> {
        let (channel, wire) = self.routes.get(&characteristic)?;
        Some((*channel, wire.decode(data)))
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.routes.values().map(|(channel, _)| *channel)
    }
}
