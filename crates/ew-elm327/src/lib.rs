//! ECUWatch ELM327 protocol layer.
//!
//! Turns a notification-style byte link to an ELM327 adapter into decoded
//! OBD-II measurements: chunks are reassembled into lines, lines decoded
//! into PID responses, and a session state machine sequences the commands.
//! The link itself is abstract ([`ElmTransport`] plus a chunk receiver) so
//! the same session runs over BLE, the simulator, or a scripted mock.

pub mod decoder;
pub mod error;
pub mod mock;
pub mod pid;
pub mod reassembler;
pub mod session;
pub mod sim;
pub mod transport;
pub mod types;

pub use error::{ElmError, ElmResult, TransportError, TransportResult};
pub use reassembler::{Fed, LineReassembler};
pub use session::{Session, SessionConfig, SessionStats};
pub use transport::{ElmTransport, spawn_line_reader};
pub use types::{Measurement, PidResponse, ProtocolLine, RawChunk, SessionPhase, SessionState};
