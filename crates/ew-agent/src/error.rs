//! Agent error types, one enum per stage.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use ew_elm327::ElmError;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures before the session starts: discovery, connection, GATT layout.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("BLE scan failed: {0}")]
    Scan(String),

    #[error("no device named {prefix}* found")]
    NoMatchingDevice { prefix: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("service {0} not found on device")]
    MissingService(Uuid),

    #[error("characteristic {0} not found in service")]
    MissingCharacteristic(Uuid),

    #[error("cannot enable notifications: {0}")]
    Subscribe(String),

    #[error("BLE backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Top-level failure, tagged by the stage that produced it.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("session failed: {0}")]
    Session(#[from] ElmError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SetupResult<T> = Result<T, SetupError>;
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ew_elm327::{SessionPhase, TransportError};

    #[test]
    fn setup_error_names_prefix() {
        let e = AgentError::from(SetupError::NoMatchingDevice {
            prefix: "OBDII".into(),
        });
        assert_eq!(e.to_string(), "setup failed: no device named OBDII* found");
    }

    #[test]
    fn session_error_keeps_phase() {
        let e = AgentError::from(ElmError::Transport {
            phase: SessionPhase::Initialization,
            source: TransportError::Disconnected,
        });
        assert_eq!(
            e.to_string(),
            "session failed: transport failure during initialization: link disconnected"
        );
    }
}
