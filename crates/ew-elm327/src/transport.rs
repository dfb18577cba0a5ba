//! Transport boundary and the line-reader task.
//!
//! A link is split in two halves, mirroring how notification-based
//! transports behave:
//! - [`ElmTransport`]: the write half, used only by the session.
//! - a `mpsc::Receiver<RawChunk>`: the notification stream, consumed only
//!   by the line reader spawned with [`spawn_line_reader`].
//!
//! The reader owns the [`LineReassembler`]; the session owns its state.
//! Nothing else is shared between the two tasks.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportResult;
use crate::reassembler::LineReassembler;
use crate::types::{ProtocolLine, RawChunk};

/// Capacity of the reader → session line channel.
pub const LINE_CHANNEL_CAPACITY: usize = 64;

/// Write half of an adapter link.
#[async_trait]
pub trait ElmTransport: Send + Sync {
    /// Write raw bytes to the adapter. Completes once the link accepted them.
    async fn send(&self, data: &[u8]) -> TransportResult<()>;
}

/// Spawn the task that turns notification chunks into protocol lines.
///
/// The returned receiver closes when the chunk stream ends, which the
/// session treats as a disconnect.
pub fn spawn_line_reader(
    chunks: mpsc::Receiver<RawChunk>,
    max_line_len: usize,
) -> (mpsc::Receiver<ProtocolLine>, JoinHandle<()>) {
    let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    let handle = tokio::spawn(read_lines(chunks, line_tx, max_line_len));
    (line_rx, handle)
}

async fn read_lines(
    mut chunks: mpsc::Receiver<RawChunk>,
    lines: mpsc::Sender<ProtocolLine>,
    max_line_len: usize,
) {
    let mut reassembler = LineReassembler::with_max_len(max_line_len);

    while let Some(chunk) = chunks.recv().await {
        tracing::trace!(len = chunk.len(), "notification chunk");
        let fed = reassembler.feed(&chunk);
        if let Some(e) = fed.overflow {
            tracing::warn!(error = %e, "malformed notification stream, buffer discarded");
        }
        for line in fed.lines {
            tracing::trace!(line = %line, "line reassembled");
            if lines.send(line).await.is_err() {
                tracing::debug!("line consumer gone, stopping reader");
                return;
            }
        }
    }

    tracing::debug!("notification stream ended");
}
