//! ECUWatch: poll engine data from an ELM327 BLE adapter.
//!
//! Usage: `ecuwatch [config.toml]`. Measurements go to stdout, logs to
//! stderr (`RUST_LOG` filters, `ECUWATCH_LOG_FORMAT=json` for JSON lines).

use std::path::Path;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use ew_agent::config::AgentConfig;
use ew_agent::runner;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let json = std::env::var("ECUWATCH_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ecuwatch starting");

    // ── Load config ─────────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::from_file(Path::new(&path))?,
        None => AgentConfig::default(),
    };
    tracing::info!(
        backend = ?config.backend,
        prefix = %config.device.name_prefix,
        "config loaded"
    );

    // ── Shutdown on Ctrl-C, honored between commands ────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = stop_tx.send(true);
        }
    });

    let backend = runner::build_backend(&config).await?;
    runner::run(&config, backend.as_ref(), std::io::stdout(), stop_rx).await?;

    tracing::info!("ecuwatch stopped");
    Ok(())
}
