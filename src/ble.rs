//! BLE transport built on btleplug.
//!
//! Discovery scans for a fixed time, hands the results to a
//! [`DeviceSelector`], connects, and looks up the printer's write
//! characteristic. Data is written with response so every write is
//! acknowledged before the next one starts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectError, Error, Result, TransportError};
use crate::printer::{Connector, Transport};

/// Vendor service exposing the print characteristic.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_ff00_0000_1000_8000_00805f9b34fb);
/// Write characteristic receiving commands and raster data.
pub const WRITE_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000_ff02_0000_1000_8000_00805f9b34fb);

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Bluetooth address, e.g. `AA:BB:CC:DD:EE:FF`.
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Services listed in the advertisement.
    pub services: Vec<Uuid>,
}

/// Chooses which scanned device to connect to.
///
/// Returning `None` means the user declined; `connect` then fails with
/// [`ConnectError::Cancelled`].
pub enum DeviceSelector {
    /// First device that advertises a name.
    FirstNamed,
    /// First device whose name starts with the prefix, e.g. `"D30"`.
    NamePrefix(String),
    /// Device with this address (case-insensitive).
    Address(String),
    Custom(Box<dyn Fn(&[DeviceInfo]) -> Option<usize> + Send + Sync>),
}

impl DeviceSelector {
    pub fn select(&self, devices: &[DeviceInfo]) -> Option<usize> {
        match self {
            DeviceSelector::FirstNamed => devices.iter().position(|d| d.name.is_some()),
            DeviceSelector::NamePrefix(prefix) => devices.iter().position(|d| {
                d.name
                    .as_deref()
                    .is_some_and(|n| n.starts_with(prefix.as_str()))
            }),
            DeviceSelector::Address(addr) => devices
                .iter()
                .position(|d| d.id.eq_ignore_ascii_case(addr)),
            DeviceSelector::Custom(f) => f(devices).filter(|&i| i < devices.len()),
        }
    }
}

impl fmt::Debug for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::FirstNamed => f.write_str("FirstNamed"),
            DeviceSelector::NamePrefix(p) => f.debug_tuple("NamePrefix").field(p).finish(),
            DeviceSelector::Address(a) => f.debug_tuple("Address").field(a).finish(),
            DeviceSelector::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Whether a Bluetooth LE adapter is usable on this system.
pub async fn is_supported() -> bool {
    match Manager::new().await {
        Ok(manager) => manager.adapters().await.is_ok_and(|a| !a.is_empty()),
        Err(_) => false,
    }
}

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await.map_err(|e| {
        debug!("BLE manager unavailable: {}", e);
        Error::Unsupported
    })?;
    let adapters = manager
        .adapters()
        .await
        .map_err(|e| Error::Connect(ConnectError::Scan(e)))?;
    adapters
        .into_iter()
        .next()
        .ok_or(Error::Connect(ConnectError::NoAdapter))
}

async fn scan_peripherals(
    adapter: &Adapter,
    duration: Duration,
) -> std::result::Result<Vec<(DeviceInfo, Peripheral)>, ConnectError> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(ConnectError::Scan)?;
    tokio::time::sleep(duration).await;
    let peripherals = adapter.peripherals().await.map_err(ConnectError::Scan);
    if let Err(e) = adapter.stop_scan().await {
        debug!("stop_scan: {}", e);
    }

    let mut found = Vec::new();
    for p in peripherals? {
        let props = p.properties().await.map_err(ConnectError::Scan)?;
        let info = DeviceInfo {
            id: p.address().to_string(),
            name: props.as_ref().and_then(|pr| pr.local_name.clone()),
            rssi: props.as_ref().and_then(|pr| pr.rssi),
            services: props.map(|pr| pr.services).unwrap_or_default(),
        };
        found.push((info, p));
    }
    Ok(found)
}

/// Scan for nearby BLE devices.
///
/// - `duration`: how long to listen for advertisements
pub async fn scan(duration: Duration) -> Result<Vec<DeviceInfo>> {
    let adapter = first_adapter().await?;
    let found = scan_peripherals(&adapter, duration).await?;
    Ok(found.into_iter().map(|(info, _)| info).collect())
}

/// [`Connector`] that finds the printer over BLE.
///
/// - `scan_duration`: advertisement listening time (default 3s)
/// - `connect_timeout`: GATT connect and discovery limit (default 10s)
/// - `service_uuid` / `characteristic_uuid`: vendor write endpoint
/// - `selector`: picks the device from scan results
#[derive(Debug)]
pub struct BleConnector {
    pub scan_duration: Duration,
    pub connect_timeout: Duration,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub selector: DeviceSelector,
}

impl Default for BleConnector {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
            service_uuid: SERVICE_UUID,
            characteristic_uuid: WRITE_CHARACTERISTIC_UUID,
            selector: DeviceSelector::FirstNamed,
        }
    }
}

impl BleConnector {
    pub fn new(selector: DeviceSelector) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    async fn open(&self, peripheral: &Peripheral) -> std::result::Result<Characteristic, ConnectError> {
        peripheral.connect().await.map_err(ConnectError::Gatt)?;
        peripheral
            .discover_services()
            .await
            .map_err(ConnectError::Gatt)?;

        let services = peripheral.services();
        let service = services
            .iter()
            .find(|s| s.uuid == self.service_uuid)
            .ok_or(ConnectError::ServiceNotFound(self.service_uuid))?;
        service
            .characteristics
            .iter()
            .find(|c| c.uuid == self.characteristic_uuid)
            .cloned()
            .ok_or(ConnectError::CharacteristicNotFound(self.characteristic_uuid))
    }
}

#[async_trait]
impl Connector for BleConnector {
    type Link = BleLink;

    async fn connect(&mut self) -> Result<BleLink> {
        let adapter = first_adapter().await?;
        let mut found = scan_peripherals(&adapter, self.scan_duration).await?;
        debug!("scan found {} devices", found.len());

        let infos: Vec<DeviceInfo> = found.iter().map(|(info, _)| info.clone()).collect();
        let index = self
            .selector
            .select(&infos)
            .ok_or(ConnectError::Cancelled)?;
        let (info, peripheral) = found.swap_remove(index);
        info!("connecting to id={} name={:?}", info.id, info.name);

        let opened = tokio::time::timeout(self.connect_timeout, self.open(&peripheral)).await;
        let characteristic = match opened {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                let _ = peripheral.disconnect().await;
                return Err(e.into());
            }
            Err(_) => {
                let _ = peripheral.disconnect().await;
                return Err(ConnectError::Timeout(self.connect_timeout).into());
            }
        };

        Ok(BleLink {
            info,
            peripheral,
            characteristic,
        })
    }
}

/// Connected printer characteristic.
pub struct BleLink {
    info: DeviceInfo,
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl BleLink {
    pub fn device(&self) -> &DeviceInfo {
        &self.info
    }
}

#[async_trait]
impl Transport for BleLink {
    async fn write(&mut self, data: &[u8]) -> std::result::Result<(), TransportError> {
        self.peripheral
            .write(&self.characteristic, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> std::result::Result<(), TransportError> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral.disconnect().await?;
        } else {
            warn!("device {} already disconnected", self.info.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(id: &str, name: Option<&str>) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: name.map(str::to_string),
            rssi: None,
            services: vec![],
        }
    }

    #[test]
    fn selectors_pick_expected_device() {
        let devices = vec![
            dev("00:00:00:00:00:01", None),
            dev("00:00:00:00:00:02", Some("Headphones")),
            dev("aa:bb:cc:dd:ee:ff", Some("D30")),
        ];
        assert_eq!(DeviceSelector::FirstNamed.select(&devices), Some(1));
        assert_eq!(
            DeviceSelector::NamePrefix("D3".into()).select(&devices),
            Some(2)
        );
        assert_eq!(
            DeviceSelector::Address("AA:BB:CC:DD:EE:FF".into()).select(&devices),
            Some(2)
        );
        assert_eq!(DeviceSelector::NamePrefix("Q".into()).select(&devices), None);
    }

    #[test]
    fn custom_selector_out_of_range_is_cancel() {
        let devices = vec![dev("00:00:00:00:00:01", Some("D30"))];
        let pick_last = DeviceSelector::Custom(Box::new(|d| Some(d.len())));
        assert_eq!(pick_last.select(&devices), None);
        let decline = DeviceSelector::Custom(Box::new(|_| None));
        assert_eq!(decline.select(&devices), None);
    }

    #[test]
    fn default_uuids_are_vendor_endpoint() {
        let c = BleConnector::default();
        assert_eq!(c.service_uuid.to_string(), "0000ff00-0000-1000-8000-00805f9b34fb");
        assert_eq!(
            c.characteristic_uuid.to_string(),
            "0000ff02-0000-1000-8000-00805f9b34fb"
        );
    }
}
