//! Response line parsing and PID interpretation.
//!
//! Two line layouts are accepted because adapter firmware differs on
//! whether the mode/PID header is fused:
//!
//! ```text
//! 41 0C 1A F8     separate header tokens
//! 410C 1A F8      fused 4-character header
//! ```
//!
//! Anything else (echoes, `OK`, `NO DATA`, banners, other modes, bad hex)
//! yields `None`. Rejection is routine and never an error.
//!
//! The identifier is taken verbatim. Adapters print it upper-case, so a
//! lower-case `410c` decodes but matches no table entry.

use crate::pid;
use crate::types::{MODE01_POSITIVE, Measurement, PidResponse, ProtocolLine};

/// Parse a line into a positive mode 01 response.
pub fn decode(line: &ProtocolLine) -> Option<PidResponse> {
    let tokens: Vec<&str> = line.as_str().split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.len() < 2 {
        return None;
    }

    let head = tokens[0];
    let (id, data_tokens) = if head.len() == 4 && head.starts_with(MODE01_POSITIVE) {
        (head.to_string(), &tokens[1..])
    } else if head == MODE01_POSITIVE && tokens.len() >= 3 {
        (format!("{head}{}", tokens[1]), &tokens[2..])
    } else {
        return None;
    };

    if data_tokens.is_empty() {
        return None;
    }

    let data = data_tokens
        .iter()
        .map(|t| parse_hex_byte(t))
        .collect::<Option<Vec<u8>>>()?;

    Some(PidResponse { id, data })
}

/// Convert a response into a measurement via the PID table.
///
/// Missing data bytes read as zero.
pub fn interpret(response: &PidResponse) -> Option<Measurement> {
    let spec = pid::lookup(&response.id)?;
    if response.data.len() < spec.min_bytes {
        tracing::trace!(
            id = %response.id,
            got = response.data.len(),
            want = spec.min_bytes,
            "short PID response, padding with zeros"
        );
    }

    let a = response.data.first().copied().unwrap_or(0);
    let b = response.data.get(1).copied().unwrap_or(0);
    Some((spec.decode)(a, b))
}

/// `decode` then `interpret`, for callers that only want the value.
pub fn decode_measurement(line: &ProtocolLine) -> Option<Measurement> {
    decode(line).as_ref().and_then(interpret)
}

fn parse_hex_byte(token: &str) -> Option<u8> {
    if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}
