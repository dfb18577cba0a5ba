//! Session state machine: initialization, then request/response polling.
//!
//! At most one command is outstanding at a time. A command completes when
//! the adapter answers or when `command_timeout` elapses, whichever comes
//! first; the next command is not sent before that.
//!
//! ```text
//! Uninitialized ──► Initializing(0..6) ──► Polling ──┐
//!        │                 │                  ▲     │ cycle, sleep
//!        └─────────────────┴──► Faulted ◄─────┴─────┘
//! ```

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::decoder;
use crate::error::{ElmError, ElmResult, TransportError};
use crate::transport::ElmTransport;
use crate::types::{
    CMD_RESET, INIT_SEQUENCE, Measurement, POLL_SEQUENCE, ProtocolLine, REPLY_OK, REPLY_UNKNOWN,
    SessionPhase, SessionState, encode_command, expected_response_id,
};

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on waiting for a reply to one command.
    pub command_timeout: Duration,
    /// Pause between polling cycles.
    pub poll_interval: Duration,
    /// Wait after `ATZ` before anything else is sent.
    pub reset_settle: Duration,
    /// Pause after every command.
    pub command_spacing: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1000),
            reset_settle: Duration::from_millis(1000),
            command_spacing: Duration::from_millis(50),
        }
    }
}

/// Counters kept over the life of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Completed polling cycles.
    pub cycles: u64,
    pub commands_sent: u64,
    pub responses_decoded: u64,
    /// Commands abandoned after `command_timeout`.
    pub timeouts: u64,
    /// Lines read that answered nothing: banners, stale replies, noise.
    pub discarded_lines: u64,
}

/// What ended a wait for the adapter.
enum Wait<T> {
    Done(T),
    TimedOut,
}

/// Drives one adapter from reset to steady-state polling.
pub struct Session<'a> {
    transport: &'a dyn ElmTransport,
    lines: mpsc::Receiver<ProtocolLine>,
    config: SessionConfig,
    state: SessionState,
    faulted_in: Option<SessionPhase>,
    stats: SessionStats,
}

impl<'a> Session<'a> {
    /// `lines` is the output of [`crate::transport::spawn_line_reader`] for
    /// the same link `transport` writes to.
    pub fn new(
        transport: &'a dyn ElmTransport,
        lines: mpsc::Receiver<ProtocolLine>,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            lines,
            config,
            state: SessionState::Uninitialized,
            faulted_in: None,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Send the initialization sequence, one command at a time.
    ///
    /// Each command waits for its own reply: the banner for `ATZ` (after
    /// the settle delay), `OK` or `?` for the rest. Unanswered commands are
    /// logged and skipped; only transport failures abort. Ends in
    /// [`SessionState::Polling`].
    pub async fn initialize(&mut self) -> ElmResult<()> {
        self.ensure_usable()?;

        for (step, &command) in INIT_SEQUENCE.iter().enumerate() {
            self.state = SessionState::Initializing(step);
            self.discard_pending()?;
            self.send(command).await?;

            if command == CMD_RESET {
                tokio::time::sleep(self.config.reset_settle).await;
            }
            if let Wait::TimedOut = self.await_ack(command).await? {
                self.stats.timeouts += 1;
                tracing::warn!(command, step, "no reply to init command, continuing");
            }

            tokio::time::sleep(self.config.command_spacing).await;
        }

        self.state = SessionState::Polling;
        tracing::info!("adapter initialized");
        Ok(())
    }

    /// Send one PID query and wait for its response.
    ///
    /// Returns `Ok(None)` when the adapter stays silent past the timeout or
    /// answers with something that has no measurement.
    pub async fn query(&mut self, command: &str) -> ElmResult<Option<Measurement>> {
        self.ensure_usable()?;
        let expected = expected_response_id(command);

        self.discard_pending()?;
        self.send(command).await?;

        match self.await_response(expected.as_deref()).await? {
            Wait::Done(measurement) => {
                if let Some(m) = measurement {
                    self.stats.responses_decoded += 1;
                    tracing::debug!(command, measurement = %m, "decoded");
                }
                Ok(measurement)
            }
            Wait::TimedOut => {
                self.stats.timeouts += 1;
                tracing::warn!(command, timeout = ?self.config.command_timeout, "command timed out");
                Ok(None)
            }
        }
    }

    /// Run every poll command once and collect what decoded.
    pub async fn poll_cycle(&mut self) -> ElmResult<Vec<Measurement>> {
        let mut out = Vec::with_capacity(POLL_SEQUENCE.len());
        for &command in POLL_SEQUENCE {
            if let Some(m) = self.query(command).await? {
                out.push(m);
            }
            tokio::time::sleep(self.config.command_spacing).await;
        }
        self.stats.cycles += 1;
        Ok(out)
    }

    /// Initialize if needed, then poll until `shutdown` turns true or the
    /// measurement consumer goes away.
    ///
    /// Shutdown is checked between commands; a command in flight always
    /// completes or times out first.
    pub async fn run(
        &mut self,
        sink: mpsc::Sender<Measurement>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ElmResult<SessionStats> {
        if self.state != SessionState::Polling {
            self.initialize().await?;
        }
        tracing::info!("polling started");

        'polling: loop {
            for &command in POLL_SEQUENCE {
                if *shutdown.borrow() {
                    break 'polling;
                }
                if sink.is_closed() {
                    tracing::debug!("measurement consumer gone");
                    break 'polling;
                }
                if let Some(m) = self.query(command).await?
                    && sink.send(m).await.is_err()
                {
                    tracing::debug!("measurement consumer gone");
                    break 'polling;
                }
                tokio::time::sleep(self.config.command_spacing).await;
            }
            self.stats.cycles += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = stop_signal(&mut shutdown) => break,
            }
        }

        tracing::info!(
            cycles = self.stats.cycles,
            decoded = self.stats.responses_decoded,
            timeouts = self.stats.timeouts,
            "polling stopped"
        );
        Ok(self.stats)
    }

    // ── Internals ───────────────────────────────────────────────

    fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Polling => SessionPhase::Polling,
            SessionState::Faulted => self.faulted_in.unwrap_or(SessionPhase::Initialization),
            SessionState::Uninitialized | SessionState::Initializing(_) => {
                SessionPhase::Initialization
            }
        }
    }

    fn ensure_usable(&self) -> ElmResult<()> {
        match self.faulted_in {
            Some(phase) => Err(ElmError::Transport {
                phase,
                source: TransportError::NotConnected,
            }),
            None => Ok(()),
        }
    }

    fn fault(&mut self, source: TransportError) -> ElmError {
        let phase = self.phase();
        self.state = SessionState::Faulted;
        self.faulted_in = Some(phase);
        tracing::error!(%phase, error = %source, "session faulted");
        ElmError::Transport { phase, source }
    }

    async fn send(&mut self, command: &str) -> ElmResult<()> {
        tracing::debug!(command, "sending");
        match self.transport.send(&encode_command(command)).await {
            Ok(()) => {
                self.stats.commands_sent += 1;
                Ok(())
            }
            Err(e) => Err(self.fault(e)),
        }
    }

    /// Drop lines that arrived while no command was outstanding.
    fn discard_pending(&mut self) -> ElmResult<()> {
        loop {
            match self.lines.try_recv() {
                Ok(line) => {
                    self.stats.discarded_lines += 1;
                    tracing::trace!(line = %line, "discarding unsolicited line");
                }
                Err(mpsc::error::TryRecvError::Empty) => return Ok(()),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Err(self.fault(TransportError::Disconnected));
                }
            }
        }
    }

    /// Next line before `deadline`; a closed stream faults the session.
    async fn next_line(&mut self, deadline: Instant) -> ElmResult<Wait<ProtocolLine>> {
        match tokio::time::timeout_at(deadline, self.lines.recv()).await {
            Err(_) => Ok(Wait::TimedOut),
            Ok(Some(line)) => Ok(Wait::Done(line)),
            Ok(None) => Err(self.fault(TransportError::Disconnected)),
        }
    }

    /// Wait for the line that answers init `command`, skipping echoes and
    /// leftovers from earlier commands.
    async fn await_ack(&mut self, command: &str) -> ElmResult<Wait<()>> {
        let deadline = Instant::now() + self.config.command_timeout;
        loop {
            let Wait::Done(line) = self.next_line(deadline).await? else {
                return Ok(Wait::TimedOut);
            };
            if acknowledges(command, line.as_str()) {
                tracing::debug!(command, reply = %line, "acknowledged");
                return Ok(Wait::Done(()));
            }
            tracing::trace!(command, line = %line, "not an acknowledgement, skipped");
            self.stats.discarded_lines += 1;
        }
    }

    /// Wait for a decodable response carrying `expected` (any, if `None`).
    async fn await_response(
        &mut self,
        expected: Option<&str>,
    ) -> ElmResult<Wait<Option<Measurement>>> {
        let deadline = Instant::now() + self.config.command_timeout;
        loop {
            let Wait::Done(line) = self.next_line(deadline).await? else {
                return Ok(Wait::TimedOut);
            };
            let Some(response) = decoder::decode(&line) else {
                tracing::trace!(line = %line, "line dropped");
                self.stats.discarded_lines += 1;
                continue;
            };
            if expected.is_some_and(|id| id != response.id) {
                tracing::trace!(id = %response.id, "stale response skipped");
                self.stats.discarded_lines += 1;
                continue;
            }
            return Ok(Wait::Done(decoder::interpret(&response)));
        }
    }
}

/// Whether `reply` completes init `command`. Reset answers with its
/// banner; other AT commands with `OK`, or `?` when unsupported.
fn acknowledges(command: &str, reply: &str) -> bool {
    if reply.eq_ignore_ascii_case(command) {
        return false;
    }
    command == CMD_RESET || reply.eq_ignore_ascii_case(REPLY_OK) || reply == REPLY_UNKNOWN
}

/// Resolves once the flag reads true. A dropped sender never stops the
/// session.
async fn stop_signal(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
