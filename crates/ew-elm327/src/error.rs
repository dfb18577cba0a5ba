//! ELM327 protocol-layer error types.
//!
//! Only transport and stream failures surface here. Malformed response
//! lines never become errors: the decoder drops them.

use thiserror::Error;

use crate::types::SessionPhase;

/// Failures reported by a [`crate::transport::ElmTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("link disconnected")]
    Disconnected,
}

/// Errors that end an ELM327 session.
#[derive(Debug, Error)]
pub enum ElmError {
    #[error("transport failure during {phase}: {source}")]
    Transport {
        phase: SessionPhase,
        #[source]
        source: TransportError,
    },

    #[error("line buffer overflow: {len} bytes without terminator (limit {limit})")]
    LineOverflow { len: usize, limit: usize },
}

impl ElmError {
    /// Phase the session was in when it failed, if the error is phase-bound.
    pub fn phase(&self) -> Option<SessionPhase> {
        match self {
            Self::Transport { phase, .. } => Some(*phase),
            Self::LineOverflow { .. } => None,
        }
    }
}

/// Convenience alias for transport results.
pub type TransportResult<T> = Result<T, TransportError>;

/// Convenience alias for protocol-layer results.
pub type ElmResult<T> = Result<T, ElmError>;
