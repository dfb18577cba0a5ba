//! Agent configuration, loadable from TOML. Every field has a default.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use ew_elm327::SessionConfig;
use ew_elm327::types::DEFAULT_MAX_LINE_LEN;

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration for the agent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Which BLE implementation to use.
    #[serde(default)]
    pub backend: Backend,
    /// How measurements are written to stdout.
    #[serde(default)]
    pub output: OutputFormat,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub gatt: GattConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Btleplug,
    /// In-process ELM327 simulator; no radio needed.
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Device discovery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Advertised-name prefix, matched case-insensitively.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,
}

/// GATT layout of the adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GattConfig {
    #[serde(default = "default_service_uuid")]
    pub service_uuid: Uuid,
    /// Characteristic the adapter notifies on.
    #[serde(default = "default_notify_uuid")]
    pub notify_uuid: Uuid,
    /// Characteristic commands are written to.
    #[serde(default = "default_write_uuid")]
    pub write_uuid: Uuid,
}

/// Session timing, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reset_settle")]
    pub reset_settle_ms: u64,
    #[serde(default = "default_command_spacing")]
    pub command_spacing_ms: u64,
    /// Reassembler cap on unterminated input.
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

fn default_name_prefix() -> String {
    "OBDII".to_string()
}

fn default_scan_timeout() -> u64 {
    5
}

fn default_service_uuid() -> Uuid {
    Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb)
}

fn default_notify_uuid() -> Uuid {
    Uuid::from_u128(0x0000fff1_0000_1000_8000_00805f9b34fb)
}

fn default_write_uuid() -> Uuid {
    Uuid::from_u128(0x0000fff2_0000_1000_8000_00805f9b34fb)
}

fn default_command_timeout() -> u64 {
    1000
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_reset_settle() -> u64 {
    1000
}

fn default_command_spacing() -> u64 {
    50
}

fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            scan_timeout_secs: default_scan_timeout(),
        }
    }
}

impl DeviceConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

impl Default for GattConfig {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            notify_uuid: default_notify_uuid(),
            write_uuid: default_write_uuid(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout(),
            poll_interval_ms: default_poll_interval(),
            reset_settle_ms: default_reset_settle(),
            command_spacing_ms: default_command_spacing(),
            max_line_len: default_max_line_len(),
        }
    }
}

impl AgentConfig {
    /// Load and validate config from a TOML file path.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("device.name_prefix is empty".into()));
        }
        if self.session.command_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.command_timeout_ms must be non-zero".into(),
            ));
        }
        if self.session.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.session.max_line_len == 0 {
            return Err(ConfigError::Invalid(
                "session.max_line_len must be non-zero".into(),
            ));
        }
        if self.gatt.notify_uuid == self.gatt.write_uuid {
            return Err(ConfigError::Invalid(
                "gatt.notify_uuid and gatt.write_uuid must differ".into(),
            ));
        }
        Ok(())
    }

    /// Timing for [`ew_elm327::Session`].
    pub fn session_config(&self) -> SessionConfig {
        let ms = Duration::from_millis;
        SessionConfig {
            command_timeout: ms(self.session.command_timeout_ms),
            poll_interval: ms(self.session.poll_interval_ms),
            reset_settle: ms(self.session.reset_settle_ms),
            command_spacing: ms(self.session.command_spacing_ms),
        }
    }
}
