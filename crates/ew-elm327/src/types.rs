//! Core ELM327 types, protocol constants, and command sequences.

use serde::Serialize;
use std::fmt;

// ── Framing ─────────────────────────────────────────────────────

/// Line terminator emitted by the adapter (and appended to every command).
pub const LINE_TERMINATOR: u8 = b'\r';

/// Prompt the adapter prints when it is ready for the next command.
pub const PROMPT: char = '>';

/// Characters trimmed from both ends of every reassembled segment.
pub const TRIM_CHARS: &[char] = &[PROMPT, '\n', ' ', '\0'];

/// Default cap on unterminated text held by the reassembler.
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

// ── AT commands ─────────────────────────────────────────────────

/// Full adapter reset. Needs a settle delay afterwards.
pub const CMD_RESET: &str = "ATZ";
/// Echo off.
pub const CMD_ECHO_OFF: &str = "ATE0";
/// Linefeeds off.
pub const CMD_LINEFEEDS_OFF: &str = "ATL0";
/// Spaces off.
pub const CMD_SPACES_OFF: &str = "ATS0";
/// Headers off.
pub const CMD_HEADERS_OFF: &str = "ATH0";
/// Automatic protocol selection.
pub const CMD_AUTO_PROTOCOL: &str = "ATSP0";

/// Reply to an accepted AT command.
pub const REPLY_OK: &str = "OK";
/// Reply to a command the adapter does not understand.
pub const REPLY_UNKNOWN: &str = "?";

/// Initialization commands, in the order they are sent.
pub const INIT_SEQUENCE: &[&str] = &[
    CMD_RESET,
    CMD_ECHO_OFF,
    CMD_LINEFEEDS_OFF,
    CMD_SPACES_OFF,
    CMD_HEADERS_OFF,
    CMD_AUTO_PROTOCOL,
];

// ── OBD-II mode 01 ──────────────────────────────────────────────

/// Positive response code for a mode 01 request (0x01 + 0x40).
pub const MODE01_POSITIVE: &str = "41";

/// Engine RPM query.
pub const CMD_ENGINE_RPM: &str = "010C";
/// Vehicle speed query.
pub const CMD_VEHICLE_SPEED: &str = "010D";
/// Coolant temperature query.
pub const CMD_COOLANT_TEMP: &str = "0105";

/// PID queries issued once per polling cycle, in order.
pub const POLL_SEQUENCE: &[&str] = &[CMD_ENGINE_RPM, CMD_VEHICLE_SPEED, CMD_COOLANT_TEMP];

/// Response identifier expected for a mode 01 query (`"010C"` → `"410C"`).
///
/// Returns `None` for anything that is not a 4-character mode 01 query.
pub fn expected_response_id(command: &str) -> Option<String> {
    let pid = command.strip_prefix("01")?;
    if pid.len() != 2 || !pid.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{MODE01_POSITIVE}{}", pid.to_ascii_uppercase()))
}

/// Encode a command for transmission: ASCII followed by a carriage return.
pub fn encode_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(LINE_TERMINATOR);
    bytes
}

// ── Data model ──────────────────────────────────────────────────

/// A raw notification payload, at whatever granularity the link delivers.
pub type RawChunk = Vec<u8>;

/// A trimmed, terminator-free line of adapter output.
///
/// Never empty; never contains the line terminator or the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolLine(String);

impl ProtocolLine {
    /// Trim a raw segment and wrap it, or `None` if nothing usable remains.
    pub fn new(segment: &str) -> Option<Self> {
        let trimmed = segment.trim_matches(TRIM_CHARS);
        if trimmed.is_empty()
            || trimmed.contains(PROMPT)
            || trimmed.contains(LINE_TERMINATOR as char)
        {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProtocolLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A positive mode 01 response: 4-character identifier plus data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidResponse {
    /// Mode + PID identifier, e.g. `"410C"`.
    pub id: String,
    /// Data bytes, at least one.
    pub data: Vec<u8>,
}

/// A decoded physical value, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Measurement {
    EngineRpm(u32),
    VehicleSpeedKmh(u8),
    CoolantTempC(i16),
}

impl Measurement {
    /// Response identifier this measurement is decoded from.
    pub fn pid(&self) -> &'static str {
        match self {
            Self::EngineRpm(_) => "410C",
            Self::VehicleSpeedKmh(_) => "410D",
            Self::CoolantTempC(_) => "4105",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EngineRpm(_) => "Engine RPM",
            Self::VehicleSpeedKmh(_) => "Vehicle Speed",
            Self::CoolantTempC(_) => "Coolant Temperature",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::EngineRpm(_) => "rpm",
            Self::VehicleSpeedKmh(_) => "km/h",
            Self::CoolantTempC(_) => "°C",
        }
    }

    /// Numeric value, widened for uniform presentation.
    pub fn value(&self) -> i64 {
        match *self {
            Self::EngineRpm(v) => i64::from(v),
            Self::VehicleSpeedKmh(v) => i64::from(v),
            Self::CoolantTempC(v) => i64::from(v),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.name(), self.value(), self.unit())
    }
}

/// Session lifecycle, owned by the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Index into [`INIT_SEQUENCE`] of the command being processed.
    Initializing(usize),
    Polling,
    Faulted,
}

/// Coarse phase used to attribute transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initialization,
    Polling,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization => f.write_str("initialization"),
            Self::Polling => f.write_str("polling"),
        }
    }
}
