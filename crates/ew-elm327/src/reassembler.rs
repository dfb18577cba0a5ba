//! Reassembles notification chunks into adapter lines.
//!
//! The link delivers output at its own granularity: a chunk may hold part
//! of a line, several lines, or a bare prompt. Bytes are buffered until a
//! carriage return arrives, then each segment is trimmed and emitted as a
//! [`ProtocolLine`] if anything is left.

use crate::error::ElmError;
use crate::types::{DEFAULT_MAX_LINE_LEN, LINE_TERMINATOR, ProtocolLine};

/// What one chunk produced.
#[derive(Debug, Default)]
pub struct Fed {
    /// Lines the chunk completed, in arrival order.
    pub lines: Vec<ProtocolLine>,
    /// Set when the unterminated remainder outgrew the cap and was dropped.
    pub overflow: Option<ElmError>,
}

/// Stateful line splitter. One instance per link, owned by one task.
#[derive(Debug)]
pub struct LineReassembler {
    pending: Vec<u8>,
    max_len: usize,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a reassembler that rejects unterminated text longer than `max_len`.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_len,
        }
    }

    /// Append a chunk and return every line it completes.
    ///
    /// Only the unterminated remainder is subject to the cap. On overflow
    /// that remainder is discarded so the stream can resync at the next
    /// terminator; lines completed earlier in the chunk are still returned.
    pub fn feed(&mut self, chunk: &[u8]) -> Fed {
        self.pending.extend_from_slice(chunk);

        let mut fed = Fed::default();
        while let Some(pos) = self.pending.iter().position(|&b| b == LINE_TERMINATOR) {
            let segment: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = latin1(&segment[..pos]);
            if let Some(line) = ProtocolLine::new(&text) {
                fed.lines.push(line);
            }
        }

        if self.pending.len() > self.max_len {
            fed.overflow = Some(ElmError::LineOverflow {
                len: self.pending.len(),
                limit: self.max_len,
            });
            self.pending.clear();
        }

        fed
    }

    /// Bytes buffered without a terminator yet.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Default for LineReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-byte text decoding: every byte maps to the code point of equal value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
