//! Simulated BLE backend wrapping [`SimulatedElm327`].
//!
//! Advertises one or more devices and a configurable service layout, then
//! routes writes on the write characteristic into the simulator and its
//! output back out as notifications. Only one connection can be opened.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use ew_elm327::sim::SimulatedElm327;
use ew_elm327::{ElmTransport, RawChunk, TransportError, TransportResult};

use crate::ble::{BleBackend, DiscoveredDevice, GattConnection, GattService};
use crate::config::GattConfig;
use crate::error::{SetupError, SetupResult};

/// Advertised name of the default simulated device.
pub const SIMULATED_DEVICE_NAME: &str = "OBDII-SIM";

/// In-process stand-in for a BLE stack with an ELM327 on the other end.
pub struct SimulatedBackend {
    devices: Vec<DiscoveredDevice>,
    services: Vec<GattService>,
    gatt: GattConfig,
    adapter: Arc<SimulatedElm327>,
    chunks: Mutex<Option<mpsc::Receiver<RawChunk>>>,
}

impl SimulatedBackend {
    /// One device named [`SIMULATED_DEVICE_NAME`] exposing the configured
    /// service with both characteristics.
    pub fn new(gatt: &GattConfig) -> Self {
        let (adapter, chunks) = SimulatedElm327::new();
        Self::with_adapter(gatt, adapter, chunks)
    }

    /// Wrap an existing simulator (e.g. one with a custom MTU).
    pub fn with_adapter(
        gatt: &GattConfig,
        adapter: SimulatedElm327,
        chunks: mpsc::Receiver<RawChunk>,
    ) -> Self {
        Self {
            devices: vec![DiscoveredDevice {
                id: "00:11:22:33:44:55".to_string(),
                name: Some(SIMULATED_DEVICE_NAME.to_string()),
                rssi: Some(-60),
            }],
            services: vec![GattService {
                uuid: gatt.service_uuid,
                characteristics: vec![gatt.notify_uuid, gatt.write_uuid],
            }],
            gatt: gatt.clone(),
            adapter: Arc::new(adapter),
            chunks: Mutex::new(Some(chunks)),
        }
    }

    /// Replace the advertised device list.
    pub fn with_devices(mut self, devices: Vec<DiscoveredDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Replace the service layout reported after connecting.
    pub fn with_services(mut self, services: Vec<GattService>) -> Self {
        self.services = services;
        self
    }

    /// The simulator behind the link, for steering it mid-session.
    pub fn adapter(&self) -> Arc<SimulatedElm327> {
        Arc::clone(&self.adapter)
    }
}

#[async_trait]
impl BleBackend for SimulatedBackend {
    async fn scan(&self, timeout: Duration) -> SetupResult<Vec<DiscoveredDevice>> {
        tracing::debug!(?timeout, devices = self.devices.len(), "simulated scan");
        Ok(self.devices.clone())
    }

    async fn connect(&self, device: &DiscoveredDevice) -> SetupResult<Box<dyn GattConnection>> {
        if !self.devices.contains(device) {
            return Err(SetupError::Connect(format!("unknown device {}", device.id)));
        }
        let chunks = self
            .chunks
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SetupError::Connect("simulated adapter already connected".into()))?;

        Ok(Box::new(SimulatedConnection {
            services: self.services.clone(),
            notify_uuid: self.gatt.notify_uuid,
            write_uuid: self.gatt.write_uuid,
            adapter: Arc::clone(&self.adapter),
            chunks: Mutex::new(Some(chunks)),
        }))
    }
}

struct SimulatedConnection {
    services: Vec<GattService>,
    notify_uuid: Uuid,
    write_uuid: Uuid,
    adapter: Arc<SimulatedElm327>,
    chunks: Mutex<Option<mpsc::Receiver<RawChunk>>>,
}

impl SimulatedConnection {
    fn exposes(&self, characteristic: Uuid) -> bool {
        self.services
            .iter()
            .any(|s| s.characteristics.contains(&characteristic))
    }
}

#[async_trait]
impl GattConnection for SimulatedConnection {
    async fn services(&self) -> SetupResult<Vec<GattService>> {
        Ok(self.services.clone())
    }

    async fn subscribe(&self, characteristic: Uuid) -> SetupResult<mpsc::Receiver<RawChunk>> {
        if characteristic != self.notify_uuid || !self.exposes(characteristic) {
            return Err(SetupError::Subscribe(format!(
                "{characteristic} does not notify"
            )));
        }
        self.chunks
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SetupError::Subscribe("already subscribed".into()))
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> TransportResult<()> {
        if characteristic != self.write_uuid {
            return Err(TransportError::WriteRejected(format!(
                "{characteristic} is not writable"
            )));
        }
        self.adapter.send(data).await
    }
}
