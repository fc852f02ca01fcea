//! btleplug backed transport
//!
//! Selection scans for a fixed window and takes the first peripheral the
//! filter accepts. Link loss is reported from the adapter's event stream.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central as _, CentralEvent as AdapterEvent, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info};

use crate::Error;
use crate::transport::{CharacteristicRef, DiscoveryFilter, Link, LinkEvent, ServiceInfo, Transport};

pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// A device seen during a scan
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    /// Whether the profile's filter would select it
    pub matches_profile: bool,
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, Error> {
    let manager = Manager::new().await.map_err(Error::transport("opening the BLE manager"))?;
    let adapters = manager.adapters().await.map_err(Error::transport("listing adapters"))?;
    adapters.into_iter().next().ok_or(Error::UnsupportedPlatform)
}

#[derive(Debug, Clone)]
pub struct BtleTransport {
    scan_duration: Duration,
}

impl Default for BtleTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_DURATION)
    }
}

impl BtleTransport {
    pub fn new(scan_duration: Duration) -> Self {
        Self { scan_duration }
    }

    /// Scan for the configured window and list everything that advertised
    pub async fn scan(&self, filter: &DiscoveryFilter) -> Result<Vec<DiscoveredDevice>, Error> {
        let adapter = get_adapter().await?;
        let found = scan_peripherals(&adapter, self.scan_duration).await?;

        let mut devices = Vec::with_capacity(found.len());
        for (peripheral, props) in found {
            let address = peripheral.address().to_string();
            let matches_profile = filter.matches(props.local_name.as_deref(), &address, &props.services);
            devices.push(DiscoveredDevice {
                name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
                address,
                rssi: props.rssi,
                matches_profile,
            });
        }
        Ok(devices)
    }
}

async fn scan_peripherals(
    adapter: &Adapter,
    duration: Duration,
) -> Result<Vec<(Peripheral, btleplug::api::PeripheralProperties)>, Error> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(Error::transport("starting scan"))?;
    tokio::time::sleep(duration).await;

    let listed = advertised(adapter).await;
    let stopped = adapter.stop_scan().await.map_err(Error::transport("stopping scan"));
    finish_scan(listed, stopped)
}

async fn advertised(adapter: &Adapter) -> Result<Vec<(Peripheral, btleplug::api::PeripheralProperties)>, Error> {
    let peripherals = adapter.peripherals().await.map_err(Error::transport("listing peripherals"))?;
    let mut found = Vec::with_capacity(peripherals.len());
    for peripheral in peripherals {
        if let Some(props) = peripheral
            .properties()
            .await
            .map_err(Error::transport("reading advertisement"))?
        {
            found.push((peripheral, props));
        }
    }
    Ok(found)
}

/// The scan is stopped whether or not listing worked; a listing error wins.
fn finish_scan<T>(listed: Result<T, Error>, stopped: Result<(), Error>) -> Result<T, Error> {
    match (listed, stopped) {
        (Ok(found), Ok(())) => Ok(found),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), stopped) => {
            if let Err(stop) = stopped {
                debug!(error = %stop, "stopping scan after a failed listing");
            }
            Err(err)
        }
    }
}

#[async_trait]
impl Transport for BtleTransport {
    type Link = BtleLink;

    async fn is_available(&self) -> bool {
        match get_adapter().await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "no usable adapter");
                false
            }
        }
    }

    async fn request_device(&self, filter: &DiscoveryFilter) -> Result<BtleLink, Error> {
        let adapter = get_adapter().await?;
        let found = scan_peripherals(&adapter, self.scan_duration).await?;

        for (peripheral, props) in found {
            let address = peripheral.address().to_string();
            if filter.matches(props.local_name.as_deref(), &address, &props.services) {
                info!(name = ?props.local_name, %address, "selected device");
                return Ok(BtleLink {
                    adapter,
                    peripheral,
                    name: props.local_name,
                });
            }
        }
        Err(Error::DeviceSelectionAborted)
    }
}

pub struct BtleLink {
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
}

impl BtleLink {
    fn characteristic(&self, target: &CharacteristicRef, operation: &'static str) -> Result<Characteristic, Error> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == target.uuid && c.service_uuid == target.service)
            .ok_or_else(|| Error::transport(operation)(format!("characteristic {} was not discovered", target.uuid)))
    }
}

#[async_trait]
impl Link for BtleLink {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn connect(&self) -> Result<(), Error> {
        self.peripheral.connect().await.map_err(Error::transport("connect"))
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.peripheral.disconnect().await.map_err(Error::transport("disconnect"))
    }

    async fn services(&self) -> Result<Vec<ServiceInfo>, Error> {
        self.peripheral
            .discover_services()
            .await
            .map_err(Error::transport("service discovery"))?;
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .map(|service| ServiceInfo {
                uuid: service.uuid,
                characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
            })
            .collect())
    }

    async fn read(&self, characteristic: &CharacteristicRef) -> Result<Vec<u8>, Error> {
        let c = self.characteristic(characteristic, "read")?;
        self.peripheral.read(&c).await.map_err(Error::transport("read"))
    }

    async fn write(&self, characteristic: &CharacteristicRef, data: &[u8]) -> Result<(), Error> {
        let c = self.characteristic(characteristic, "write")?;
        self.peripheral
            .write(&c, data, WriteType::WithResponse)
            .await
            .map_err(Error::transport("write"))
    }

    async fn subscribe(&self, characteristic: &CharacteristicRef) -> Result<(), Error> {
        let c = self.characteristic(characteristic, "subscribe")?;
        self.peripheral.subscribe(&c).await.map_err(Error::transport("subscribe"))
    }

    async fn events(&self) -> Result<BoxStream<'static, LinkEvent>, Error> {
        let notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(Error::transport("notification stream"))?
            .map(|n| LinkEvent::Notification {
                characteristic: n.uuid,
                value: n.value,
            });

        let id = self.peripheral.id();
        let disconnects = self
            .adapter
            .events()
            .await
            .map_err(Error::transport("adapter event stream"))?
            .filter_map(move |event| {
                let lost = matches!(&event, AdapterEvent::DeviceDisconnected(gone) if *gone == id);
                async move { lost.then_some(LinkEvent::Disconnected) }
            });

        Ok(futures::stream::select(notifications, disconnects).boxed())
    }
}
