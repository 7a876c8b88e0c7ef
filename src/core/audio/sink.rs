use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;

use super::LocalPlayback;

/// Frames queued for the caller connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerFrame {
    /// Raw PCM16 audio to send as a binary message
    Audio(Bytes),
    /// Close the caller connection
    Close,
}

/// Fans synthesized audio out to the caller and, optionally, local playback.
///
/// The caller connection has exactly one writer task; the sink only enqueues
/// frames for it. Delivery failures are logged and never interrupt the
/// session's event loop.
#[derive(Clone)]
pub struct AudioSink {
    caller_tx: mpsc::Sender<CallerFrame>,
    playback: Option<Arc<LocalPlayback>>,
    delivered_chunks: Arc<AtomicU64>,
    delivered_bytes: Arc<AtomicU64>,
}

impl AudioSink {
    /// Create a sink that forwards audio to the caller writer queue.
    pub fn new(caller_tx: mpsc::Sender<CallerFrame>) -> Self {
        Self {
            caller_tx,
            playback: None,
            delivered_chunks: Arc::new(AtomicU64::new(0)),
            delivered_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Also mirror audio to a local output device.
    pub fn with_playback(mut self, playback: LocalPlayback) -> Self {
        self.playback = Some(Arc::new(playback));
        self
    }

    /// Deliver one chunk of synthesized audio.
    pub async fn deliver(&self, audio: Bytes) {
        if audio.is_empty() {
            return;
        }

        let len = audio.len() as u64;
        match self.caller_tx.send(CallerFrame::Audio(audio.clone())).await {
            Ok(()) => {
                self.delivered_chunks.fetch_add(1, Ordering::Relaxed);
                self.delivered_bytes.fetch_add(len, Ordering::Relaxed);
            }
            Err(_) => {
                tracing::warn!(bytes = len, "Caller connection gone, dropping audio chunk");
            }
        }

        if let Some(playback) = &self.playback {
            playback.play(&audio);
        }
    }

    /// Ask the caller writer to close the connection.
    pub async fn close(&self) {
        if self.caller_tx.send(CallerFrame::Close).await.is_err() {
            tracing::debug!("Caller writer already stopped");
        }
    }

    /// Whether the caller writer is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.caller_tx.is_closed()
    }

    /// Number of chunks handed to the caller writer.
    pub fn delivered_chunks(&self) -> u64 {
        self.delivered_chunks.load(Ordering::Relaxed)
    }

    /// Number of audio bytes handed to the caller writer.
    pub fn delivered_bytes(&self) -> u64 {
        self.delivered_bytes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AudioSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSink")
            .field("open", &self.is_open())
            .field("playback", &self.playback.is_some())
            .field("delivered_chunks", &self.delivered_chunks())
            .finish()
    }
}
