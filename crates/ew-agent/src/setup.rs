//! Device selection and GATT setup.
//!
//! Everything here runs before the session exists; any failure is a
//! [`SetupError`] and the session never starts.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use ew_elm327::{ElmTransport, RawChunk, TransportResult};

use crate::ble::{BleBackend, DiscoveredDevice, GattConnection};
use crate::config::{DeviceConfig, GattConfig};
use crate::error::{SetupError, SetupResult};

/// Pick the first device whose advertised name starts with `prefix`,
/// ignoring case. Devices without a name never match.
pub fn select_device<'d>(devices: &'d [DiscoveredDevice], prefix: &str) -> Option<&'d DiscoveredDevice> {
    let prefix = prefix.to_lowercase();
    devices.iter().find(|d| {
        d.name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().starts_with(&prefix))
    })
}

/// Write half of a GATT link: every send goes to the write characteristic.
pub struct GattTransport {
    connection: Box<dyn GattConnection>,
    write_uuid: Uuid,
}

#[async_trait]
impl ElmTransport for GattTransport {
    async fn send(&self, data: &[u8]) -> TransportResult<()> {
        self.connection.write(self.write_uuid, data).await
    }
}

/// A ready link: notifications enabled, writes going to the right place.
pub struct Link {
    pub device: DiscoveredDevice,
    pub transport: GattTransport,
    pub chunks: mpsc::Receiver<RawChunk>,
}

/// Scan, select, connect, check the GATT layout, and subscribe.
pub async fn establish(
    backend: &dyn BleBackend,
    device_config: &DeviceConfig,
    gatt: &GattConfig,
) -> SetupResult<Link> {
    let timeout = device_config.scan_timeout();
    tracing::info!(prefix = %device_config.name_prefix, ?timeout, "scanning");

    let devices = backend.scan(timeout).await?;
    tracing::debug!(count = devices.len(), "scan complete");

    let device = select_device(&devices, &device_config.name_prefix)
        .cloned()
        .ok_or_else(|| SetupError::NoMatchingDevice {
            prefix: device_config.name_prefix.clone(),
        })?;
    tracing::info!(
        id = %device.id,
        name = device.name.as_deref().unwrap_or_default(),
        "device selected"
    );

    let connection = backend.connect(&device).await?;

    let services = connection.services().await?;
    let service = services
        .iter()
        .find(|s| s.uuid == gatt.service_uuid)
        .ok_or(SetupError::MissingService(gatt.service_uuid))?;
    for characteristic in [gatt.notify_uuid, gatt.write_uuid] {
        if !service.characteristics.contains(&characteristic) {
            return Err(SetupError::MissingCharacteristic(characteristic));
        }
    }

    let chunks = connection.subscribe(gatt.notify_uuid).await?;
    tracing::info!(id = %device.id, "connected, notifications enabled");

    Ok(Link {
        device,
        transport: GattTransport {
            connection,
            write_uuid: gatt.write_uuid,
        },
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, name: Option<&str>) -> DiscoveredDevice {
        DiscoveredDevice {
            id: id.to_string(),
            name: name.map(str::to_string),
            rssi: None,
        }
    }

    #[test]
    fn selects_first_prefix_match() {
        let devices = [
            device("a", Some("Headphones")),
            device("b", Some("OBDII")),
            device("c", Some("OBDII-2")),
        ];
        assert_eq!(select_device(&devices, "OBDII").unwrap().id, "b");
    }

    #[test]
    fn prefix_match_ignores_case() {
        let devices = [device("a", Some("obdII v2.1"))];
        assert_eq!(select_device(&devices, "OBDII").unwrap().id, "a");
        assert_eq!(select_device(&devices, "obdii").unwrap().id, "a");
    }

    #[test]
    fn unnamed_and_non_matching_devices_are_skipped() {
        let devices = [device("a", None), device("b", Some("XOBDII"))];
        assert!(select_device(&devices, "OBDII").is_none());
        assert!(select_device(&[], "OBDII").is_none());
    }
}
