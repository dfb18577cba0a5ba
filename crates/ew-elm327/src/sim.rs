//! In-process ELM327 simulator.
//!
//! Behaves like an adapter behind a notification link: honors the AT
//! settings the session touches (echo, linefeeds, spaces, headers), ends
//! every reply with the `>` prompt, answers mode 01 PIDs from a table, and
//! splits its output into MTU-sized chunks.
//!
//! With spaces off, real firmware disagrees on layout. Clones commonly keep
//! data bytes spaced and fuse only the header (`410C 1A F8`); strict firmware
//! prints everything compact (`410C1AF8`). [`SpacesOffLayout`] picks one.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::mock::MOCK_CHUNK_CAPACITY;
use crate::transport::ElmTransport;
use crate::types::{PROMPT, REPLY_OK, REPLY_UNKNOWN, RawChunk};

/// Banner printed after `ATZ` and for `ATI`.
pub const BANNER: &str = "ELM327 v1.5";

/// Default notification payload size (23-byte ATT MTU minus 3 bytes of header).
pub const DEFAULT_MTU: usize = 20;

/// Response layout used while spaces are off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpacesOffLayout {
    /// `410C 1A F8`
    #[default]
    FusedHeader,
    /// `410C1AF8`
    Compact,
}

/// Adapter settings changed by AT commands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct AdapterSettings {
    /// ATE0/ATE1
    pub echo: bool,
    /// ATL0/ATL1
    pub linefeeds: bool,
    /// ATS0/ATS1
    pub spaces: bool,
    /// ATH0/ATH1
    pub headers: bool,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            echo: true,
            linefeeds: true,
            spaces: true,
            headers: false,
        }
    }
}

impl AdapterSettings {
    fn line_ending(&self) -> &'static str {
        if self.linefeeds { "\r\n" } else { "\r" }
    }
}

struct SimState {
    settings: AdapterSettings,
    layout: SpacesOffLayout,
    pids: BTreeMap<u8, Vec<u8>>,
    received: Vec<String>,
    muted: bool,
}

/// Simulated adapter implementing [`ElmTransport`].
pub struct SimulatedElm327 {
    state: Mutex<SimState>,
    chunk_tx: Mutex<Option<mpsc::Sender<RawChunk>>>,
    mtu: usize,
}

impl SimulatedElm327 {
    /// Create a simulator with [`DEFAULT_MTU`] and its notification stream.
    pub fn new() -> (Self, mpsc::Receiver<RawChunk>) {
        Self::with_mtu(DEFAULT_MTU)
    }

    /// Create a simulator that emits at most `mtu` bytes per chunk.
    pub fn with_mtu(mtu: usize) -> (Self, mpsc::Receiver<RawChunk>) {
        let (tx, rx) = mpsc::channel(MOCK_CHUNK_CAPACITY);
        let pids = BTreeMap::from([
            (0x0C, vec![0x1A, 0xF8]), // 1726 rpm
            (0x0D, vec![0x3C]),       // 60 km/h
            (0x05, vec![0x7B]),       // 83 °C
        ]);
        let sim = Self {
            state: Mutex::new(SimState {
                settings: AdapterSettings::default(),
                layout: SpacesOffLayout::default(),
                pids,
                received: Vec::new(),
                muted: false,
            }),
            chunk_tx: Mutex::new(Some(tx)),
            mtu: mtu.max(1),
        };
        (sim, rx)
    }

    pub fn set_spaces_off_layout(&self, layout: SpacesOffLayout) {
        self.state.lock().unwrap().layout = layout;
    }

    /// Set the data bytes returned for a mode 01 PID.
    pub fn set_pid(&self, pid: u8, data: &[u8]) {
        self.state.lock().unwrap().pids.insert(pid, data.to_vec());
    }

    /// Make a PID answer `NO DATA`.
    pub fn remove_pid(&self, pid: u8) {
        self.state.lock().unwrap().pids.remove(&pid);
    }

    /// While muted, commands are recorded but produce no output.
    pub fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    /// Close the notification stream and reject further sends.
    pub fn disconnect(&self) {
        self.chunk_tx.lock().unwrap().take();
    }

    /// Commands received so far, upper-cased and trimmed.
    pub fn received(&self) -> Vec<String> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn settings(&self) -> AdapterSettings {
        self.state.lock().unwrap().settings.clone()
    }

    /// Full adapter output (echo included) for one command.
    pub fn respond(&self, command: &str) -> String {
        let mut state = self.state.lock().unwrap();
        respond(&mut state, command)
    }

    fn split(&self, output: &str) -> Vec<RawChunk> {
        output
            .as_bytes()
            .chunks(self.mtu)
            .map(<[u8]>::to_vec)
            .collect()
    }
}

#[async_trait]
impl ElmTransport for SimulatedElm327 {
    async fn send(&self, data: &[u8]) -> TransportResult<()> {
        let tx = match self.chunk_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(TransportError::Disconnected),
        };

        let text = String::from_utf8_lossy(data);
        let command = text.split('\r').next().unwrap_or("").trim().to_ascii_uppercase();
        if command.is_empty() {
            return Ok(());
        }

        let output = {
            let mut state = self.state.lock().unwrap();
            state.received.push(command.clone());
            if state.muted {
                return Ok(());
            }
            respond(&mut state, &command)
        };

        for chunk in self.split(&output) {
            if tx.try_send(chunk).is_err() {
                tracing::warn!("simulated adapter notification queue full");
            }
        }
        Ok(())
    }
}

fn respond(state: &mut SimState, command: &str) -> String {
    let mut out = String::new();
    if state.settings.echo {
        out.push_str(command);
        out.push_str(state.settings.line_ending());
    }

    if command == "ATZ" {
        state.settings = AdapterSettings::default();
        let le = state.settings.line_ending();
        out.push_str(&format!("{le}{le}{BANNER}{le}{le}{PROMPT}"));
        return out;
    }

    // A setting change applies from the next reply on.
    let le = state.settings.line_ending();
    let body = if command.starts_with("AT") {
        at_command(&mut state.settings, command)
    } else {
        obd_command(state, command)
    };
    out.push_str(&format!("{body}{le}{le}{PROMPT}"));
    out
}

fn at_command(settings: &mut AdapterSettings, command: &str) -> String {
    let flag = |on: &str| command.ends_with(on);
    match command {
        "ATE0" | "ATE1" => settings.echo = flag("1"),
        "ATL0" | "ATL1" => settings.linefeeds = flag("1"),
        "ATS0" | "ATS1" => settings.spaces = flag("1"),
        "ATH0" | "ATH1" => settings.headers = flag("1"),
        "ATI" => return BANNER.to_string(),
        c if c.starts_with("ATSP") || c.starts_with("ATST") || c.starts_with("ATAT") => {}
        _ => return REPLY_UNKNOWN.to_string(),
    }
    REPLY_OK.to_string()
}

fn obd_command(state: &SimState, command: &str) -> String {
    let Some(pid_hex) = command.strip_prefix("01") else {
        return REPLY_UNKNOWN.to_string();
    };
    if pid_hex.len() != 2 || !pid_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return REPLY_UNKNOWN.to_string();
    }
    let Ok(pid) = u8::from_str_radix(pid_hex, 16) else {
        return REPLY_UNKNOWN.to_string();
    };

    match state.pids.get(&pid) {
        Some(data) => format_response(&state.settings, state.layout, pid, data),
        None => "NO DATA".to_string(),
    }
}

fn format_response(
    settings: &AdapterSettings,
    layout: SpacesOffLayout,
    pid: u8,
    data: &[u8],
) -> String {
    let hex: Vec<String> = data.iter().map(|b| format!("{b:02X}")).collect();

    let body = if settings.spaces {
        format!("41 {pid:02X} {}", hex.join(" "))
    } else {
        match layout {
            SpacesOffLayout::FusedHeader => format!("41{pid:02X} {}", hex.join(" ")),
            SpacesOffLayout::Compact => format!("41{pid:02X}{}", hex.concat()),
        }
    };

    if !settings.headers {
        return body;
    }
    let len = data.len() + 2;
    if settings.spaces {
        format!("7E8 {len:02X} {body}")
    } else {
        format!("7E8{len:02X}{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_prints_banner_with_echo() {
        let (sim, _rx) = SimulatedElm327::new();
        assert_eq!(sim.respond("ATZ"), "ATZ\r\n\r\n\r\nELM327 v1.5\r\n\r\n>");
    }

    #[test]
    fn echo_off_takes_effect_on_next_command() {
        let (sim, _rx) = SimulatedElm327::new();
        assert_eq!(sim.respond("ATE0"), "ATE0\r\nOK\r\n\r\n>");
        assert_eq!(sim.respond("ATL0"), "OK\r\n\r\n>");
        assert_eq!(sim.respond("ATH0"), "OK\r\r>");
        assert!(!sim.settings().echo);
        assert!(!sim.settings().linefeeds);
    }

    #[test]
    fn pid_layouts() {
        let (sim, _rx) = SimulatedElm327::new();
        sim.respond("ATE0");
        sim.respond("ATL0");
        assert_eq!(sim.respond("010C"), "41 0C 1A F8\r\r>");

        sim.respond("ATS0");
        assert_eq!(sim.respond("010C"), "410C 1A F8\r\r>");

        sim.set_spaces_off_layout(SpacesOffLayout::Compact);
        assert_eq!(sim.respond("010C"), "410C1AF8\r\r>");
    }

    #[test]
    fn headers_prefix_can_id() {
        let (sim, _rx) = SimulatedElm327::new();
        sim.respond("ATE0");
        sim.respond("ATL0");
        sim.respond("ATH1");
        assert_eq!(sim.respond("010D"), "7E8 03 41 0D 3C\r\r>");
    }

    #[test]
    fn unknown_pid_and_command() {
        let (sim, _rx) = SimulatedElm327::new();
        sim.respond("ATE0");
        sim.respond("ATL0");
        assert_eq!(sim.respond("0111"), "NO DATA\r\r>");
        assert_eq!(sim.respond("0902"), "?\r\r>");
        assert_eq!(sim.respond("ATXYZ"), "?\r\r>");
        assert_eq!(sim.respond("ATSP0"), "OK\r\r>");
    }

    #[tokio::test]
    async fn output_is_split_at_mtu() {
        let (sim, mut rx) = SimulatedElm327::with_mtu(4);
        sim.send(b"ATE0\r").await.unwrap();

        let mut chunks = Vec::new();
        while let Ok(c) = rx.try_recv() {
            chunks.push(c);
        }
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), b"ATE0\r\nOK\r\n\r\n>".to_vec());
    }

    #[tokio::test]
    async fn muted_adapter_records_but_stays_silent() {
        let (sim, mut rx) = SimulatedElm327::new();
        sim.set_muted(true);
        sim.send(b"010C\r").await.unwrap();
        assert_eq!(sim.received(), ["010C"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnected_adapter_rejects_sends() {
        let (sim, _rx) = SimulatedElm327::new();
        sim.disconnect();
        assert_eq!(sim.send(b"ATZ\r").await, Err(TransportError::Disconnected));
    }
}
