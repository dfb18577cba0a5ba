//! BLE collaborator boundary.
//!
//! The agent needs four things from a BLE stack: scan for advertised
//! devices, connect, enumerate services, and open a notify/write pair.
//! These traits cover exactly that so the real stack and the simulator are
//! interchangeable.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use ew_elm327::{RawChunk, TransportResult};

use crate::error::SetupResult;

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Backend-specific handle (MAC address, platform id).
    pub id: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// A primary service and the characteristics it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Device discovery and connection.
#[async_trait]
pub trait BleBackend: Send + Sync {
    /// Scan for `timeout` and report every device seen.
    async fn scan(&self, timeout: Duration) -> SetupResult<Vec<DiscoveredDevice>>;

    /// Connect to a device returned by [`BleBackend::scan`].
    async fn connect(&self, device: &DiscoveredDevice) -> SetupResult<Box<dyn GattConnection>>;
}

/// An open GATT connection.
#[async_trait]
pub trait GattConnection: Send + Sync {
    /// Services discovered on the peer.
    async fn services(&self) -> SetupResult<Vec<GattService>>;

    /// Enable notifications on `characteristic`. Each notification payload
    /// arrives as one chunk; the receiver closes when the link drops.
    async fn subscribe(&self, characteristic: Uuid) -> SetupResult<mpsc::Receiver<RawChunk>>;

    /// Write to `characteristic`.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> TransportResult<()>;
}
