//! BLE central: connection state machine and typed channel I/O
//!
//! A [`Central`] owns at most one connection. `connect` walks
//! Disconnected -> Connecting -> ResolvingServices -> Subscribing -> Connected;
//! `disconnect`, a link loss reported by the transport, and a failed connect
//! all end in Disconnected with every handle dropped.
//!
//! Each connect cycle is a numbered session. Work started for a session
//! (notification pumping, in-flight reads and writes) only takes effect while
//! that session is still the live one.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::StreamExt;
use futures::future::{join_all, try_join_all};
use futures::stream::BoxStream;
use mkriot_proto::{Channel, ChannelSpec, Profile, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::Error;
use crate::notify::Multiplexer;
use crate::observer::{Observer, StatusLevel};
use crate::registry::Registry;
use crate::transport::{CharacteristicRef, DiscoveryFilter, Link, LinkEvent, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    ResolvingServices,
    Subscribing,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::ResolvingServices => "resolving services",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Central controller for one board. Cloning shares the same connection.
pub struct Central<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Central<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T: Transport> {
    transport: T,
    profile: &'static Profile,
    filter: DiscoveryFilter,
    observer: Arc<dyn Observer>,
    connection: Mutex<Connection<T::Link>>,
    /// Held while a transition and its callbacks run, so observers see them in order
    transitions: Mutex<()>,
    sessions: AtomicU64,
}

struct Connection<L> {
    state: ConnectionState,
    session: Option<u64>,
    link: Option<Arc<L>>,
    registry: Option<Arc<Registry>>,
    multiplexer: Option<Arc<Multiplexer>>,
    pump: Option<JoinHandle<()>>,
    values: HashMap<Channel, Value>,
}

impl<L> Default for Connection<L> {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            session: None,
            link: None,
            registry: None,
            multiplexer: None,
            pump: None,
            values: HashMap::new(),
        }
    }
}

impl<T: Transport> Central<T> {
    /// Central for `profile`, selecting devices with the profile's own filter
    pub fn new(transport: T, profile: &'static Profile, observer: impl Observer) -> Self {
        Self::with_filter(transport, profile, DiscoveryFilter::for_profile(profile), observer)
    }

    pub fn with_filter(
        transport: T,
        profile: &'static Profile,
        filter: DiscoveryFilter,
        observer: impl Observer,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                profile,
                filter,
                observer: Arc::new(observer),
                connection: Mutex::new(Connection::default()),
                transitions: Mutex::new(()),
                sessions: AtomicU64::new(0),
            }),
        }
    }

    pub fn profile(&self) -> &'static Profile {
        self.inner.profile
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn device_name(&self) -> Option<String> {
        self.inner.lock().link.as_ref().and_then(|link| link.name())
    }

    /// Most recent value read, written or pushed on this connection
    pub fn last_value(&self, channel: Channel) -> Option<Value> {
        self.inner.lock().values.get(&channel).cloned()
    }

    /// Select a device, open the link, resolve every channel, subscribe to
    /// telemetry and read its current values.
    ///
    /// Any failure leaves the central Disconnected and is also reported as a
    /// warning status.
    pub async fn connect(&self) -> Result<(), Error> {
        let id = self.inner.begin()?;
        let mut opened = None;
        match self.establish(id, &mut opened).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.abort(id, opened, &err).await;
                Err(err)
            }
        }
    }

    /// `opened` receives the link once it belongs to this session, so a
    /// failure can close it even after the session was torn down.
    async fn establish(&self, id: u64, opened: &mut Option<Arc<T::Link>>) -> Result<(), Error> {
        let inner = &self.inner;

        if !inner.transport.is_available().await {
            return Err(Error::UnsupportedPlatform);
        }

        inner.status("Searching for device…", StatusLevel::Muted);
        let link = Arc::new(inner.transport.request_device(&inner.filter).await?);
        if !inner.attach(id, link.clone()) {
            if let Err(err) = link.disconnect().await {
                debug!(error = %err, "closing superseded link");
            }
            return Err(Error::NotConnected);
        }
        *opened = Some(link.clone());
        info!(session = id, device = ?link.name(), "device selected");

        inner.status("Connecting…", StatusLevel::Muted);
        link.connect().await?;

        let events = link.events().await?;
        let pump = tokio::spawn(pump(Arc::downgrade(inner), id, events));
        inner.set_pump(id, pump);

        inner.advance(id, ConnectionState::ResolvingServices)?;
        inner.status("Discovering services…", StatusLevel::Muted);
        let services = link.services().await?;
        let registry = Arc::new(Registry::resolve(inner.profile, &services)?);
        let multiplexer = Arc::new(Multiplexer::new(inner.profile, &registry));
        inner.install(id, registry.clone(), multiplexer)?;

        let telemetry: Vec<(&ChannelSpec, CharacteristicRef)> = inner
            .profile
            .telemetry()
            .filter_map(|spec| registry.get(spec.channel).map(|handle| (spec, *handle)))
            .collect();

        try_join_all(telemetry.iter().map(|(_, handle)| link.subscribe(handle))).await?;

        // subscriptions only deliver future pushes
        join_all(
            telemetry
                .iter()
                .map(|(spec, handle)| self.initial_read(id, link.as_ref(), spec, handle)),
        )
        .await;

        {
            let _order = inner.order();
            inner.advance(id, ConnectionState::Connected)?;
            info!(session = id, profile = inner.profile.name, "connected");
            inner.observer.on_connected(true);
            inner.observer.on_status("Connected", StatusLevel::Ok);
        }
        Ok(())
    }

    async fn initial_read(
        &self,
        id: u64,
        link: &T::Link,
        spec: &ChannelSpec,
        handle: &CharacteristicRef,
    ) {
        let value = match link.read(handle).await {
            Ok(data) => spec.wire.decode(&data).map_err(Error::from),
            Err(err) => Err(err),
        };
        match value {
            Ok(value) => self.inner.publish(id, spec.channel, value),
            Err(err) => debug!(channel = %spec.channel, error = %err, "initial read skipped"),
        }
    }

    async fn abort(&self, id: u64, opened: Option<Arc<T::Link>>, err: &Error) {
        warn!(session = id, error = %err, "connection attempt failed");
        // a disconnect during link setup already reset the session
        let link = self.inner.reset(id).or(opened);
        if let Some(link) = link {
            if let Err(err) = link.disconnect().await {
                debug!(error = %err, "closing link after failed connect");
            }
        }
        self.inner.status(&format!("Error: {err}"), StatusLevel::Warn);
    }

    /// Close the link and clean up. Safe to call in any state; callbacks only
    /// fire when there was something to tear down.
    pub async fn disconnect(&self) {
        let (id, link) = {
            let conn = self.inner.lock();
            (conn.session, conn.link.clone())
        };
        if let Some(link) = link {
            if let Err(err) = link.disconnect().await {
                debug!(error = %err, "disconnect failed, cleaning up anyway");
            }
        }
        if let Some(id) = id {
            self.inner.cleanup(id);
        }
    }

    /// Encode `value` with the channel's wire type and write it
    pub async fn write(&self, channel: Channel, value: &Value) -> Result<(), Error> {
        let spec = self.inner.spec(channel)?;
        if !spec.access.can_write() {
            return Err(Error::UnsupportedOperation {
                channel,
                operation: "write",
            });
        }
        let (id, link, handle) = self.inner.handle(channel)?;
        let data = spec.wire.encode(value)?;
        trace!(%channel, ?data, "write");

        let result = link.write(&handle, &data).await;
        self.inner.settle(id, result)?;
        if let Ok(written) = spec.wire.decode(&data) {
            self.inner.remember(id, channel, written);
        }
        Ok(())
    }

    /// Read the channel and decode it with its wire type
    pub async fn read(&self, channel: Channel) -> Result<Value, Error> {
        let spec = self.inner.spec(channel)?;
        if !spec.access.can_read() {
            return Err(Error::UnsupportedOperation {
                channel,
                operation: "read",
            });
        }
        let (id, link, handle) = self.inner.handle(channel)?;

        let result = link.read(&handle).await;
        let data = self.inner.settle(id, result)?;
        let value = spec.wire.decode(&data)?;
        trace!(%channel, %value, "read");
        self.inner.remember(id, channel, value.clone());
        Ok(value)
    }

    pub(crate) fn status(&self, text: &str, level: StatusLevel) {
        self.inner.status(text, level);
    }
}

impl<T: Transport> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Connection<T::Link>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn order(&self) -> MutexGuard<'_, ()> {
        self.transitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self, text: &str, level: StatusLevel) {
        let _order = self.order();
        self.observer.on_status(text, level);
    }

    fn spec(&self, channel: Channel) -> Result<&'static ChannelSpec, Error> {
        self.profile.spec(channel).ok_or(Error::UnknownChannel {
            channel,
            profile: self.profile.name,
        })
    }

    fn begin(&self) -> Result<u64, Error> {
        let mut conn = self.lock();
        if conn.state != ConnectionState::Disconnected {
            return Err(Error::Busy);
        }
        let id = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        conn.state = ConnectionState::Connecting;
        conn.session = Some(id);
        Ok(id)
    }

    fn attach(&self, id: u64, link: Arc<T::Link>) -> bool {
        let mut conn = self.lock();
        if conn.session != Some(id) {
            return false;
        }
        conn.link = Some(link);
        true
    }

    fn set_pump(&self, id: u64, pump: JoinHandle<()>) {
        let mut conn = self.lock();
        if conn.session == Some(id) {
            conn.pump = Some(pump);
        } else {
            pump.abort();
        }
    }

    fn advance(&self, id: u64, next: ConnectionState) -> Result<(), Error> {
        let mut conn = self.lock();
        if conn.session != Some(id) {
            return Err(Error::NotConnected);
        }
        debug!(session = id, from = %conn.state, to = %next, "connection state");
        conn.state = next;
        Ok(())
    }

    fn install(
        &self,
        id: u64,
        registry: Arc<Registry>,
        multiplexer: Arc<Multiplexer>,
    ) -> Result<(), Error> {
        let mut conn = self.lock();
        if conn.session != Some(id) {
            return Err(Error::NotConnected);
        }
        debug!(session = id, from = %conn.state, to = %ConnectionState::Subscribing, "connection state");
        conn.state = ConnectionState::Subscribing;
        conn.registry = Some(registry);
        conn.multiplexer = Some(multiplexer);
        Ok(())
    }

    /// Drop session `id` without callbacks, returning its link for closing
    fn reset(&self, id: u64) -> Option<Arc<T::Link>> {
        let mut conn = self.lock();
        if conn.session != Some(id) {
            return None;
        }
        let old = std::mem::take(&mut *conn);
        if let Some(pump) = old.pump {
            pump.abort();
        }
        old.link
    }

    /// The single teardown path for a live or connecting session.
    ///
    /// Returns false, without callbacks, when `id` is no longer the live session.
    fn cleanup(&self, id: u64) -> bool {
        let _order = self.order();
        let old = {
            let mut conn = self.lock();
            if conn.session != Some(id) || conn.state == ConnectionState::Disconnected {
                return false;
            }
            std::mem::take(&mut *conn)
        };
        if let Some(pump) = old.pump {
            pump.abort();
        }
        info!(session = id, from = %old.state, "disconnected");

        self.observer.on_connected(false);
        self.observer.on_status("Disconnected", StatusLevel::Muted);
        self.observer.on_disconnected();
        true
    }

    fn handle(&self, channel: Channel) -> Result<(u64, Arc<T::Link>, CharacteristicRef), Error> {
        let conn = self.lock();
        if conn.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        match (conn.session, &conn.link, &conn.registry) {
            (Some(id), Some(link), Some(registry)) => {
                let handle = registry.get(channel).copied().ok_or(Error::NotConnected)?;
                Ok((id, link.clone(), handle))
            }
            _ => Err(Error::NotConnected),
        }
    }

    /// An I/O result from session `id` only stands if the session is still live
    fn settle<R>(&self, id: u64, result: Result<R, Error>) -> Result<R, Error> {
        let live = self.lock().session == Some(id);
        match result {
            Ok(_) if !live => Err(Error::NotConnected),
            other => other,
        }
    }

    fn remember(&self, id: u64, channel: Channel, value: Value) {
        let mut conn = self.lock();
        if conn.session == Some(id) {
            conn.values.insert(channel, value);
        }
    }

    fn publish(&self, id: u64, channel: Channel, value: Value) {
        let _order = self.order();
        {
            let mut conn = self.lock();
            if conn.session != Some(id) {
                return;
            }
            conn.values.insert(channel, value.clone());
        }
        self.observer.on_value(channel, &value);
    }

    fn notification(&self, id: u64, characteristic: Uuid, data: &[u8]) {
        let decoded = {
            let conn = self.lock();
            if conn.session != Some(id) {
                return;
            }
            let Some(multiplexer) = &conn.multiplexer else {
                trace!(%characteristic, "notification before subscription");
                return;
            };
            multiplexer.dispatch(characteristic, data)
        };

        match decoded {
            Some((channel, Ok(value))) => self.publish(id, channel, value),
            Some((channel, Err(err))) => {
                warn!(%channel, error = %err, len = data.len(), "dropping malformed notification");
            }
            None => trace!(%characteristic, "notification for unrouted characteristic"),
        }
    }
}

/// Forward link events of session `id` until the link goes away
async fn pump<T: Transport>(inner: Weak<Inner<T>>, id: u64, mut events: BoxStream<'static, LinkEvent>) {
    while let Some(event) = events.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match event {
            LinkEvent::Notification {
                characteristic,
                value,
            } => inner.notification(id, characteristic, &value),
            LinkEvent::Disconnected => {
                info!(session = id, "link lost");
                inner.cleanup(id);
                return;
            }
        }
    }

    if let Some(inner) = inner.upgrade() {
        debug!(session = id, "link event stream ended");
        inner.cleanup(id);
    }
}
