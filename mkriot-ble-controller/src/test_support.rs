//! In-memory board used by the controller tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use mkriot_proto::{Profile, WireType};
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use crate::Error;
use crate::observer::CentralEvent;
use crate::transport::{CharacteristicRef, DiscoveryFilter, Link, LinkEvent, ServiceInfo, Transport};

const ADDRESS: &str = "C4:DE:E2:00:00:01";

/// The services a board flashed with `profile` exposes
pub(crate) fn services_for(profile: &Profile) -> Vec<ServiceInfo> {
    profile
        .services()
        .into_iter()
        .map(|uuid| ServiceInfo {
            uuid,
            characteristics: profile
                .channels
                .iter()
                .filter(|spec| profile.service_uuid(spec.service) == Some(uuid))
                .map(|spec| spec.uuid)
                .collect(),
        })
        .collect()
}

/// Next observer event, or `None` after a second of silence
pub(crate) async fn next_event(rx: &mut mpsc::UnboundedReceiver<CentralEvent>) -> Option<CentralEvent> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.ok().flatten()
}

/// Everything the observer has received until things go quiet
pub(crate) async fn drain(rx: &mut mpsc::UnboundedReceiver<CentralEvent>) -> Vec<CentralEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
        seen.push(event);
    }
    seen
}

pub(crate) struct SimDevice {
    name: String,
    services: Vec<ServiceInfo>,
    values: Mutex<HashMap<Uuid, Vec<u8>>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    subscriptions: Mutex<Vec<Uuid>>,
    failing_reads: Mutex<HashSet<Uuid>>,
    events: Mutex<Option<mpsc::UnboundedSender<LinkEvent>>>,
    calls: AtomicUsize,
    connected: AtomicBool,
    drop_during_discovery: AtomicBool,
    hold_writes: AtomicBool,
    release: Notify,
    hold_connect: AtomicBool,
    connect_gate: Notify,
}

impl SimDevice {
    /// A board running the firmware for `profile`, every value zeroed
    pub(crate) fn new(profile: &Profile) -> Arc<Self> {
        let device = Self::build(services_for(profile));
        {
            let mut values = device.values.lock().unwrap();
            for spec in profile.channels {
                let zeroed = match spec.wire {
                    WireType::Text => Vec::new(),
                    other => vec![0; other.size().unwrap_or(0)],
                };
                values.insert(spec.uuid, zeroed);
            }
        }
        Arc::new(device)
    }

    pub(crate) fn with_services(services: Vec<ServiceInfo>) -> Arc<Self> {
        Arc::new(Self::build(services))
    }

    fn build(services: Vec<ServiceInfo>) -> Self {
        Self {
            name: "Arduino".to_string(),
            services,
            values: Mutex::default(),
            writes: Mutex::default(),
            subscriptions: Mutex::default(),
            failing_reads: Mutex::default(),
            events: Mutex::default(),
            calls: AtomicUsize::new(0),
            connected: AtomicBool::new(false),
            drop_during_discovery: AtomicBool::new(false),
            hold_writes: AtomicBool::new(false),
            release: Notify::new(),
            hold_connect: AtomicBool::new(false),
            connect_gate: Notify::new(),
        }
    }

    pub(crate) fn set_value(&self, uuid: Uuid, data: Vec<u8>) {
        self.values.lock().unwrap().insert(uuid, data);
    }

    pub(crate) fn fail_reads(&self, uuid: Uuid) {
        self.failing_reads.lock().unwrap().insert(uuid);
    }

    pub(crate) fn drop_during_discovery(&self) {
        self.drop_during_discovery.store(true, Ordering::SeqCst);
    }

    /// Park writes until [`Self::release_writes`]
    pub(crate) fn hold_writes(&self) {
        self.hold_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_writes(&self) {
        self.hold_writes.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    /// Park link setup until [`Self::release_connect`]
    pub(crate) fn hold_connect(&self) {
        self.hold_connect.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release_connect(&self) {
        self.hold_connect.store(false, Ordering::SeqCst);
        self.connect_gate.notify_one();
    }

    /// Push a value as the board would
    pub(crate) fn notify(&self, uuid: Uuid, data: Vec<u8>) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(LinkEvent::Notification { characteristic: uuid, value: data });
        }
    }

    /// The board goes out of range
    pub(crate) fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(tx) = self.events.lock().unwrap().take() {
            let _ = tx.send(LinkEvent::Disconnected);
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of link operations issued so far
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn subscriptions(&self) -> Vec<Uuid> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub(crate) fn written(&self, uuid: Uuid) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == uuid)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Every write, in the order the board received them
    pub(crate) fn write_log(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    async fn op(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::transport(operation)("link closed"))
        }
    }
}

pub(crate) struct SimTransport {
    available: bool,
    device: Option<Arc<SimDevice>>,
}

impl SimTransport {
    pub(crate) fn new(device: Arc<SimDevice>) -> Self {
        Self { available: true, device: Some(device) }
    }

    /// Nothing in range
    pub(crate) fn empty() -> Self {
        Self { available: true, device: None }
    }

    /// No adapter at all
    pub(crate) fn unavailable() -> Self {
        Self { available: false, device: None }
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Link = SimLink;

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn request_device(&self, filter: &DiscoveryFilter) -> Result<SimLink, Error> {
        let device = self.device.as_ref().ok_or(Error::DeviceSelectionAborted)?;
        let advertised: Vec<Uuid> = device.services.iter().map(|s| s.uuid).collect();
        if !filter.matches(Some(&device.name), ADDRESS, &advertised) {
            return Err(Error::DeviceSelectionAborted);
        }
        Ok(SimLink { device: device.clone() })
    }
}

pub(crate) struct SimLink {
    device: Arc<SimDevice>,
}

#[async_trait]
impl Link for SimLink {
    fn name(&self) -> Option<String> {
        Some(self.device.name.clone())
    }

    async fn connect(&self) -> Result<(), Error> {
        self.device.op().await;
        if self.device.hold_connect.load(Ordering::SeqCst) {
            self.device.connect_gate.notified().await;
        }
        self.device.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.device.op().await;
        if self.device.is_connected() {
            self.device.drop_link();
        }
        Ok(())
    }

    async fn services(&self) -> Result<Vec<ServiceInfo>, Error> {
        self.device.op().await;
        self.device.ensure_connected("service discovery")?;
        let services = self.device.services.clone();
        if self.device.drop_during_discovery.load(Ordering::SeqCst) {
            self.device.drop_link();
            tokio::task::yield_now().await;
        }
        Ok(services)
    }

    async fn read(&self, characteristic: &CharacteristicRef) -> Result<Vec<u8>, Error> {
        self.device.op().await;
        self.device.ensure_connected("read")?;
        if self.device.failing_reads.lock().unwrap().contains(&characteristic.uuid) {
            return Err(Error::transport("read")("GATT read not permitted"));
        }
        self.device
            .values
            .lock()
            .unwrap()
            .get(&characteristic.uuid)
            .cloned()
            .ok_or_else(|| Error::transport("read")("unknown characteristic"))
    }

    async fn write(&self, characteristic: &CharacteristicRef, data: &[u8]) -> Result<(), Error> {
        self.device.op().await;
        if self.device.hold_writes.load(Ordering::SeqCst) {
            // the board accepted the write just as the link went down
            self.device.release.notified().await;
        } else {
            self.device.ensure_connected("write")?;
        }
        self.device.writes.lock().unwrap().push((characteristic.uuid, data.to_vec()));
        self.device.set_value(characteristic.uuid, data.to_vec());
        Ok(())
    }

    async fn subscribe(&self, characteristic: &CharacteristicRef) -> Result<(), Error> {
        self.device.op().await;
        self.device.ensure_connected("subscribe")?;
        self.device.subscriptions.lock().unwrap().push(characteristic.uuid);
        Ok(())
    }

    async fn events(&self) -> Result<BoxStream<'static, LinkEvent>, Error> {
        self.device.op().await;
        let (tx, rx) = mpsc::unbounded_channel();
        *self.device.events.lock().unwrap() = Some(tx);
        Ok(futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) }).boxed())
    }
}
