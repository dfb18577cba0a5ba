//! Shared test harness for E2E tests.
//!
//! Runs the full agent pipeline (setup, line reader, session, presenter)
//! against the simulated BLE backend, capturing stdout in memory.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use ew_agent::config::{AgentConfig, Backend, OutputFormat};
use ew_agent::error::AgentResult;
use ew_agent::runner;
use ew_agent::sim::SimulatedBackend;
use ew_elm327::SessionStats;
use ew_elm327::sim::SimulatedElm327;

/// How often the harness looks at captured output.
const WATCH_INTERVAL: Duration = Duration::from_millis(5);

/// In-memory stdout shared between the presenter and the test.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn line_count(&self) -> usize {
        self.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Result of one agent run.
pub struct Outcome {
    pub result: AgentResult<SessionStats>,
    pub output: String,
}

impl Outcome {
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    pub fn stats(&self) -> SessionStats {
        match &self.result {
            Ok(stats) => *stats,
            Err(e) => panic!("run failed: {e}"),
        }
    }
}

/// Agent wired to a simulated adapter with fast session timings.
pub struct TestHarness {
    pub config: AgentConfig,
    pub backend: SimulatedBackend,
    pub adapter: Arc<SimulatedElm327>,
    stop_tx: watch::Sender<bool>,
}

impl TestHarness {
    pub fn new() -> Self {
        let config = fast_config();
        let backend = SimulatedBackend::new(&config.gatt);
        Self::from_parts(config, backend)
    }

    /// Simulator that splits its output into `mtu`-byte notifications.
    pub fn with_mtu(mtu: usize) -> Self {
        let config = fast_config();
        let (adapter, chunks) = SimulatedElm327::with_mtu(mtu);
        let backend = SimulatedBackend::with_adapter(&config.gatt, adapter, chunks);
        Self::from_parts(config, backend)
    }

    fn from_parts(config: AgentConfig, backend: SimulatedBackend) -> Self {
        let adapter = backend.adapter();
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            backend,
            adapter,
            stop_tx,
        }
    }

    /// Reshape the simulated backend (devices, services).
    pub fn map_backend(mut self, f: impl FnOnce(SimulatedBackend) -> SimulatedBackend) -> Self {
        self.backend = f(self.backend);
        self
    }

    pub fn json_output(mut self) -> Self {
        self.config.output = OutputFormat::Json;
        self
    }

    /// Ask the session to stop at the next command boundary.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Run until `lines` measurements were printed, then stop.
    pub async fn run_for_lines(&self, lines: usize) -> Outcome {
        self.run_with(|h, buf, _| {
            if buf.line_count() >= lines {
                h.stop();
            }
        })
        .await
    }

    /// Run until `lines` measurements were printed, then call `then` once
    /// and keep running until the session ends by itself.
    pub async fn run_and_then(&self, lines: usize, then: impl FnOnce(&Self)) -> Outcome {
        let mut then = Some(then);
        self.run_with(|h, buf, _| {
            if buf.line_count() >= lines
                && let Some(action) = then.take()
            {
                action(h);
            }
        })
        .await
    }

    /// Run for `duration` of (virtual) time, then stop.
    pub async fn run_for(&self, duration: Duration) -> Outcome {
        let deadline = Instant::now() + duration;
        self.run_with(|h, _, now| {
            if now >= deadline {
                h.stop();
            }
        })
        .await
    }

    /// Run the agent, calling `on_tick` every few milliseconds with the
    /// output captured so far, until the session ends.
    pub async fn run_with(&self, mut on_tick: impl FnMut(&Self, &SharedBuf, Instant)) -> Outcome {
        let buf = SharedBuf::default();
        let run = runner::run(
            &self.config,
            &self.backend,
            buf.clone(),
            self.stop_tx.subscribe(),
        );
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                _ = tokio::time::sleep(WATCH_INTERVAL) => on_tick(self, &buf, Instant::now()),
            }
        };

        Outcome {
            result,
            output: buf.contents(),
        }
    }
}

fn fast_config() -> AgentConfig {
    let mut config = AgentConfig {
        backend: Backend::Simulated,
        ..AgentConfig::default()
    };
    config.session.command_timeout_ms = 200;
    config.session.poll_interval_ms = 100;
    config.session.reset_settle_ms = 100;
    config.session.command_spacing_ms = 10;
    config
}
