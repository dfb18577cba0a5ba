//! Wires setup, the line reader, the session, and presentation together.

use std::io::Write;
use tokio::sync::{mpsc, watch};

use ew_elm327::{Session, SessionStats, spawn_line_reader};

use crate::ble::BleBackend;
use crate::config::{AgentConfig, Backend};
use crate::error::{AgentResult, SetupResult};
use crate::present::Presenter;
use crate::setup;
use crate::sim::SimulatedBackend;

/// Buffer between the session and the presenter.
const MEASUREMENT_CHANNEL_CAPACITY: usize = 32;

/// Build the BLE backend named in the config.
pub async fn build_backend(config: &AgentConfig) -> SetupResult<Box<dyn BleBackend>> {
    match config.backend {
        Backend::Simulated => {
            tracing::info!("using simulated adapter");
            Ok(Box::new(SimulatedBackend::new(&config.gatt)))
        }
        #[cfg(feature = "btleplug")]
        Backend::Btleplug => Ok(Box::new(crate::btle::BtleplugBackend::new().await?)),
        #[cfg(not(feature = "btleplug"))]
        Backend::Btleplug => Err(crate::error::SetupError::BackendUnavailable(
            "built without the `btleplug` feature".into(),
        )),
    }
}

/// Connect through `backend` and poll until `shutdown` or a fault.
///
/// Measurements are written to `out` as they arrive. A write error on `out`
/// stops polling cleanly.
pub async fn run<W: Write>(
    config: &AgentConfig,
    backend: &dyn BleBackend,
    out: W,
    shutdown: watch::Receiver<bool>,
) -> AgentResult<SessionStats> {
    let link = setup::establish(backend, &config.device, &config.gatt).await?;
    let (lines, reader) = spawn_line_reader(link.chunks, config.session.max_line_len);
    let mut session = Session::new(&link.transport, lines, config.session_config());

    let (tx, mut rx) = mpsc::channel(MEASUREMENT_CHANNEL_CAPACITY);
    let mut presenter = Presenter::new(config.output, out);
    let present = async move {
        while let Some(measurement) = rx.recv().await {
            if let Err(e) = presenter.emit(&measurement) {
                tracing::warn!(error = %e, "output closed, stopping");
                break;
            }
        }
    };

    let (result, ()) = tokio::join!(session.run(tx, shutdown), present);
    reader.abort();

    let stats = result?;
    tracing::info!(
        device = %link.device.id,
        cycles = stats.cycles,
        commands = stats.commands_sent,
        decoded = stats.responses_decoded,
        timeouts = stats.timeouts,
        discarded = stats.discarded_lines,
        "session finished"
    );
    Ok(stats)
}
