//! btleplug-backed BLE implementation (feature `btleplug`).

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use ew_elm327::{RawChunk, TransportError, TransportResult};

use crate::ble::{BleBackend, DiscoveredDevice, GattConnection, GattService};
use crate::error::{SetupError, SetupResult};

/// Notifications buffered between the BLE stack and the line reader.
const NOTIFICATION_CAPACITY: usize = 256;

/// Uses the first Bluetooth adapter the OS reports.
pub struct BtleplugBackend {
    adapter: Adapter,
    seen: Mutex<HashMap<String, Peripheral>>,
}

impl BtleplugBackend {
    pub async fn new() -> SetupResult<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| SetupError::BackendUnavailable(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| SetupError::BackendUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| SetupError::BackendUnavailable("no Bluetooth adapter found".into()))?;
        Ok(Self {
            adapter,
            seen: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl BleBackend for BtleplugBackend {
    async fn scan(&self, timeout: Duration) -> SetupResult<Vec<DiscoveredDevice>> {
        let scan_err = |e: btleplug::Error| SetupError::Scan(e.to_string());

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(scan_err)?;
        tokio::time::sleep(timeout).await;
        let peripherals = self.adapter.peripherals().await.map_err(scan_err)?;
        if let Err(e) = self.adapter.stop_scan().await {
            tracing::warn!(error = %e, "failed to stop scan");
        }

        let mut devices = Vec::with_capacity(peripherals.len());
        let mut seen = HashMap::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let properties = peripheral.properties().await.map_err(scan_err)?;
            let id = peripheral.address().to_string();
            devices.push(DiscoveredDevice {
                id: id.clone(),
                name: properties.as_ref().and_then(|p| p.local_name.clone()),
                rssi: properties.as_ref().and_then(|p| p.rssi),
            });
            seen.insert(id, peripheral);
        }
        *self.seen.lock().unwrap() = seen;
        Ok(devices)
    }

    async fn connect(&self, device: &DiscoveredDevice) -> SetupResult<Box<dyn GattConnection>> {
        let peripheral = self
            .seen
            .lock()
            .unwrap()
            .get(&device.id)
            .cloned()
            .ok_or_else(|| SetupError::Connect(format!("{} not seen in last scan", device.id)))?;

        peripheral
            .connect()
            .await
            .map_err(|e| SetupError::Connect(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| SetupError::Connect(e.to_string()))?;

        Ok(Box::new(BtleplugConnection { peripheral }))
    }
}

struct BtleplugConnection {
    peripheral: Peripheral,
}

impl BtleplugConnection {
    fn characteristic(&self, uuid: Uuid) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
    }
}

#[async_trait]
impl GattConnection for BtleplugConnection {
    async fn services(&self) -> SetupResult<Vec<GattService>> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .map(|s| GattService {
                uuid: s.uuid,
                characteristics: s.characteristics.iter().map(|c| c.uuid).collect(),
            })
            .collect())
    }

    async fn subscribe(&self, characteristic: Uuid) -> SetupResult<mpsc::Receiver<RawChunk>> {
        let target = self
            .characteristic(characteristic)
            .ok_or(SetupError::MissingCharacteristic(characteristic))?;
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| SetupError::Subscribe(e.to_string()))?;
        self.peripheral
            .subscribe(&target)
            .await
            .map_err(|e| SetupError::Subscribe(e.to_string()))?;

        let (tx, rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != characteristic {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
            tracing::debug!("notification stream closed");
        });
        Ok(rx)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> TransportResult<()> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            return Err(TransportError::NotConnected);
        }
        let target = self
            .characteristic(characteristic)
            .ok_or_else(|| TransportError::WriteRejected(format!("{characteristic} not found")))?;
        self.peripheral
            .write(&target, data, WriteType::WithoutResponse)
            .await
            .map_err(|e| TransportError::WriteRejected(e.to_string()))
    }
}
