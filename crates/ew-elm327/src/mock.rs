//! Mock transport for testing.
//!
//! Supports scripted per-command replies, send recording, and failure
//! injection. Replies are pushed onto the notification stream exactly as
//! queued, so tests control chunk boundaries byte for byte.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::transport::ElmTransport;
use crate::types::{LINE_TERMINATOR, RawChunk};

/// Notification stream capacity for mocks; large enough that `try_send`
/// never fills up in a test.
pub const MOCK_CHUNK_CAPACITY: usize = 1024;

/// Mock transport with scripted replies and command recording.
pub struct MockTransport {
    /// Replies consumed one per `send`, each a list of chunks (FIFO order).
    replies: Mutex<VecDeque<Vec<RawChunk>>>,
    /// Every command passed to `send`, terminator stripped.
    sent: Mutex<Vec<String>>,
    /// Notification sender; `None` once disconnected.
    chunk_tx: Mutex<Option<mpsc::Sender<RawChunk>>>,
    /// Sends allowed before every further send is rejected.
    fail_after: Mutex<Option<usize>>,
}

impl MockTransport {
    /// Create a mock and the notification stream it feeds.
    pub fn new() -> (Self, mpsc::Receiver<RawChunk>) {
        let (tx, rx) = mpsc::channel(MOCK_CHUNK_CAPACITY);
        let mock = Self {
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            chunk_tx: Mutex::new(Some(tx)),
            fail_after: Mutex::new(None),
        };
        (mock, rx)
    }

    /// Queue a reply delivered as one chunk.
    pub fn queue_reply(&self, text: &str) {
        self.queue_chunks(&[text.as_bytes()]);
    }

    /// Queue a reply split into the given chunks.
    pub fn queue_chunks(&self, chunks: &[&[u8]]) {
        let reply = chunks.iter().map(|c| c.to_vec()).collect();
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Queue a send that gets no reply at all.
    pub fn queue_silence(&self) {
        self.replies.lock().unwrap().push_back(Vec::new());
    }

    /// Reject every send after the first `n`.
    pub fn fail_sends_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    /// Close the notification stream and reject further sends.
    pub fn disconnect(&self) {
        self.chunk_tx.lock().unwrap().take();
    }

    /// Commands sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ElmTransport for MockTransport {
    async fn send(&self, data: &[u8]) -> TransportResult<()> {
        let tx = match self.chunk_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(TransportError::Disconnected),
        };

        let mut sent = self.sent.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap()
            && sent.len() >= limit
        {
            return Err(TransportError::WriteRejected("injected failure".into()));
        }

        let command = data.strip_suffix(&[LINE_TERMINATOR]).unwrap_or(data);
        sent.push(String::from_utf8_lossy(command).into_owned());

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        for chunk in reply {
            let _ = tx.try_send(chunk);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_commands() {
        let (mock, _rx) = MockTransport::new();
        mock.send(b"ATZ\r").await.unwrap();
        mock.send(b"010C\r").await.unwrap();
        assert_eq!(mock.sent(), ["ATZ", "010C"]);
    }

    #[tokio::test]
    async fn replies_are_delivered_per_send() {
        let (mock, mut rx) = MockTransport::new();
        mock.queue_chunks(&[b"41 0C", b" 1A F8\r>"]);
        mock.queue_reply("OK\r>");

        mock.send(b"010C\r").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"41 0C".to_vec());
        assert_eq!(rx.recv().await.unwrap(), b" 1A F8\r>".to_vec());

        mock.send(b"ATE0\r").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"OK\r>".to_vec());
    }

    #[tokio::test]
    async fn silence_and_exhausted_queue_send_nothing() {
        let (mock, mut rx) = MockTransport::new();
        mock.queue_silence();
        mock.send(b"010D\r").await.unwrap();
        mock.send(b"0105\r").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn injected_failure() {
        let (mock, _rx) = MockTransport::new();
        mock.fail_sends_after(1);
        mock.send(b"ATZ\r").await.unwrap();
        let err = mock.send(b"ATE0\r").await.unwrap_err();
        assert!(matches!(err, TransportError::WriteRejected(_)));
        assert_eq!(mock.sent(), ["ATZ"]);
    }

    #[tokio::test]
    async fn disconnect_closes_stream() {
        let (mock, mut rx) = MockTransport::new();
        mock.disconnect();
        assert!(rx.recv().await.is_none());
        assert_eq!(mock.send(b"ATZ\r").await, Err(TransportError::Disconnected));
    }
}
