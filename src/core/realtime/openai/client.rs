//! OpenAI Realtime API client implementation.
//!
//! One [`OpenAIRealtime`] owns one upstream WebSocket for the lifetime of a
//! call. It configures the session, relays caller audio, consumes the event
//! stream and injects retrieved background context after each transcribed
//! caller utterance.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 16kHz, mono, little-endian, base64 encoded
//!
//! # Concurrency
//!
//! All writes to the socket go through a single writer task fed by a bounded
//! channel, so frames leave in the order they were queued. The read half is
//! consumed by [`RealtimeUpstream::receive_events`], normally spawned as its
//! own task. Context injections run as short-lived tasks in a `JoinSet`
//! owned by the client and are aborted on close.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use http::header::AUTHORIZATION;
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::config::{build_ws_url, context_instructions, session_instructions};
use super::messages::{ClientEvent, ServerEvent, SessionConfig, event_type};
use crate::core::audio::AudioSink;
use crate::core::context::{ContextStore, ScopeClassifier, retrieve};
use crate::core::realtime::base::{
    InjectionMode, RealtimeConfig, RealtimeError, RealtimeResult, RealtimeUpstream, SessionState,
    SessionStats, StatsSnapshot, validate_api_key,
};

/// Channel capacity for outgoing upstream frames.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long close() waits for the writer to flush the close frame.
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Transcripts this short (after trimming) never trigger an injection.
const MIN_TRANSCRIPT_CHARS: usize = 3;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Work item for the upstream writer task.
#[derive(Debug)]
enum Outbound {
    Event(ClientEvent),
    Close,
}

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// Upstream session client for the OpenAI Realtime API.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    /// Local identifier used in log fields
    label: String,
    context: Arc<ContextStore>,
    classifier: ScopeClassifier,
    sink: AudioSink,

    state: RwLock<SessionState>,
    upstream_session_id: RwLock<Option<String>>,

    /// Sender into the writer task, present while the socket is open
    outbound: Mutex<Option<mpsc::Sender<Outbound>>>,
    /// Read half, handed to the event loop exactly once
    inbound: tokio::sync::Mutex<Option<WsRead>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,

    injections: Mutex<JoinSet<()>>,
    cancel: CancellationToken,
    stats: Arc<SessionStats>,
}

impl OpenAIRealtime {
    /// Create an unconnected client delivering synthesized audio to `sink`.
    pub fn new(config: RealtimeConfig, context: Arc<ContextStore>, sink: AudioSink) -> Self {
        Self {
            config,
            label: uuid::Uuid::new_v4().to_string(),
            context,
            classifier: ScopeClassifier::default(),
            sink,
            state: RwLock::new(SessionState::Unconnected),
            upstream_session_id: RwLock::new(None),
            outbound: Mutex::new(None),
            inbound: tokio::sync::Mutex::new(None),
            writer: tokio::sync::Mutex::new(None),
            injections: Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Use a custom utterance classifier.
    pub fn with_classifier(mut self, classifier: ScopeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Use a caller-provided label in log fields.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Local session label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Session ID assigned by the upstream, once `session.created` arrived.
    pub fn upstream_session_id(&self) -> Option<String> {
        self.upstream_session_id.read().clone()
    }

    /// Client configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Move to `next` unless the session already reached a terminal state.
    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        if state.is_terminal() || *state == next {
            return;
        }
        tracing::debug!(session = %self.label, from = %*state, to = %next, "Session state change");
        *state = next;
    }

    fn fail<T>(&self, error: RealtimeError) -> RealtimeResult<T> {
        tracing::error!(session = %self.label, error = %error, "Upstream session failed");
        self.set_state(SessionState::Errored);
        Err(error)
    }

    /// Build the handshake request with bearer authentication.
    fn build_request(&self) -> RealtimeResult<http::Request<()>> {
        let url = build_ws_url(&self.config.url, &self.config.model)?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key.trim()))
            .map_err(|_| {
                RealtimeError::AuthenticationFailed("API key contains invalid characters".into())
            })?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        Ok(request)
    }

    /// The session configuration sent once after the socket opens.
    fn build_session_config(&self) -> SessionConfig {
        SessionConfig::new(
            session_instructions(&self.config.instructions, self.context.summary()),
            self.config.voice.clone(),
            self.config.transcription_model.clone(),
            self.config.turn_detection,
        )
    }

    /// Send the configuration and greeting directly, before the writer exists.
    async fn configure(&self, write: &mut WsWrite) -> RealtimeResult<()> {
        let mut preamble = vec![ClientEvent::SessionUpdate {
            session: self.build_session_config(),
        }];
        if let Some(greeting) = self.config.greeting.as_deref().filter(|g| !g.trim().is_empty()) {
            preamble.push(ClientEvent::audio_response(greeting, self.config.voice.clone()));
        }

        for event in preamble {
            let json = event.to_json()?;
            write
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
            tracing::debug!(session = %self.label, event = event.kind(), "Sent session preamble");
        }

        Ok(())
    }

    /// Spawn the single writer that owns the socket's write half.
    fn spawn_writer(&self, mut write: WsWrite, mut rx: mpsc::Receiver<Outbound>) -> JoinHandle<()> {
        let label = self.label.clone();

        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let result = match item {
                    Outbound::Event(event) => match event.to_json() {
                        Ok(json) => write.send(Message::Text(json.into())).await,
                        Err(e) => {
                            tracing::error!(session = %label, "Failed to serialize event: {}", e);
                            continue;
                        }
                    },
                    Outbound::Close => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            tracing::debug!(session = %label, "Close frame not sent: {}", e);
                        }
                        break;
                    }
                };

                if let Err(e) = result {
                    tracing::error!(session = %label, "Failed to send upstream message: {}", e);
                    break;
                }
            }

            if let Err(e) = write.close().await {
                tracing::debug!(session = %label, "Upstream sink close: {}", e);
            }
            tracing::debug!(session = %label, "Upstream writer stopped");
        })
    }

    fn sender(&self) -> Option<mpsc::Sender<Outbound>> {
        self.outbound.lock().clone()
    }

    async fn handle_text(&self, text: &str) {
        match ServerEvent::parse(text) {
            Ok(ServerEvent::Unknown) => {
                tracing::trace!(
                    session = %self.label,
                    event = event_type(text).as_deref().unwrap_or("?"),
                    "Unhandled server event"
                );
            }
            Ok(event) => self.handle_server_event(event).await,
            Err(e) => {
                self.stats.record_decode_failure();
                tracing::warn!(session = %self.label, error = %e, "Dropping undecodable upstream message");
            }
        }
    }

    /// Dispatch one decoded server event.
    async fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(
                    session = %self.label,
                    upstream_id = session.id.as_deref().unwrap_or("unknown"),
                    "Upstream session created"
                );
                *self.upstream_session_id.write() = session.id;
            }

            ServerEvent::SessionUpdated { .. } => {
                tracing::debug!(session = %self.label, "Upstream session configuration applied");
            }

            ServerEvent::SpeechStarted { audio_start_ms } => {
                tracing::debug!(session = %self.label, "Speech started at {}ms", audio_start_ms);
            }

            ServerEvent::SpeechStopped { audio_end_ms } => {
                tracing::debug!(session = %self.label, "Speech stopped at {}ms", audio_end_ms);
            }

            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                self.stats.record_transcript();
                tracing::info!(session = %self.label, transcript = %transcript, "Caller said");
                self.schedule_injection(transcript);
            }

            ServerEvent::ResponseCreated { response } => {
                tracing::debug!(session = %self.label, response = ?response.id, "Response started");
            }

            ServerEvent::ResponseDone { response } => {
                tracing::debug!(
                    session = %self.label,
                    response = ?response.id,
                    status = ?response.status,
                    "Response done"
                );
            }

            ServerEvent::AudioDelta { delta, .. } => match ServerEvent::decode_audio_delta(&delta) {
                Ok(audio) => {
                    self.stats.record_audio_received();
                    self.sink.deliver(Bytes::from(audio)).await;
                }
                Err(e) => {
                    self.stats.record_decode_failure();
                    tracing::warn!(session = %self.label, error = %e, "Dropping audio delta");
                }
            },

            ServerEvent::AudioDone { .. } => {
                tracing::debug!(session = %self.label, "Audio done");
            }

            ServerEvent::AudioTranscriptDelta { delta } => {
                tracing::trace!(session = %self.label, "Assistant transcript delta: {}", delta);
            }

            ServerEvent::AudioTranscriptDone { transcript } => {
                tracing::info!(session = %self.label, transcript = %transcript, "Assistant said");
            }

            ServerEvent::Error { error } => {
                self.stats.record_upstream_error();
                tracing::error!(
                    session = %self.label,
                    error_type = %error.error_type,
                    code = ?error.code,
                    "Upstream error: {}",
                    error.message
                );
            }

            ServerEvent::Unknown => {}
        }
    }

    /// Spawn a context injection for a caller transcript.
    ///
    /// Returns without doing anything when the transcript is too short, out
    /// of scope, or the writer is gone.
    fn schedule_injection(&self, transcript: String) {
        let transcript = transcript.trim().to_string();
        if transcript.chars().count() < MIN_TRANSCRIPT_CHARS {
            tracing::debug!(session = %self.label, "Transcript too short for context lookup");
            return;
        }

        if self.config.scope_filter && !self.classifier.is_in_scope(&transcript) {
            tracing::debug!(session = %self.label, "Transcript out of scope, no context injected");
            return;
        }

        let Some(tx) = self.sender() else {
            tracing::debug!(session = %self.label, "Writer closed, skipping context injection");
            return;
        };

        let full_document = self.config.full_document_on_request
            && self.classifier.requests_full_document(&transcript);
        let context = Arc::clone(&self.context);
        let stats = Arc::clone(&self.stats);
        let voice = self.config.voice.clone();
        let label = self.label.clone();

        let mut injections = self.injections.lock();
        while let Some(finished) = injections.try_join_next() {
            if let Err(e) = finished
                && e.is_panic()
            {
                tracing::warn!(session = %self.label, "Context injection task panicked");
            }
        }
        if self.config.injection_mode == InjectionMode::LatestOnly && !injections.is_empty() {
            tracing::debug!(session = %self.label, pending = injections.len(), "Superseding pending injections");
            injections.abort_all();
        }

        injections.spawn(async move {
            let excerpt = if full_document {
                context.full_document().to_string()
            } else {
                retrieve(&transcript, context.full_document())
            };

            let event = ClientEvent::audio_response(context_instructions(&transcript, &excerpt), voice);
            if tx.send(Outbound::Event(event)).await.is_ok() {
                stats.record_injection();
                tracing::debug!(
                    session = %label,
                    excerpt_chars = excerpt.chars().count(),
                    full_document,
                    "Injected context"
                );
            } else {
                tracing::debug!(session = %label, "Writer closed before context injection");
            }
        });
    }

    /// Abort and reap every pending injection.
    async fn cancel_injections(&self) {
        let mut pending = std::mem::take(&mut *self.injections.lock());
        pending.abort_all();
        while pending.join_next().await.is_some() {}
    }
}

#[async_trait]
impl RealtimeUpstream for OpenAIRealtime {
    async fn connect(&self) -> RealtimeResult<()> {
        {
            let state = *self.state.read();
            if state != SessionState::Unconnected {
                return Err(RealtimeError::InvalidState(format!(
                    "connect() called in state {state}"
                )));
            }
        }

        if let Err(e) = validate_api_key(&self.config.api_key) {
            return self.fail(e);
        }
        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => return self.fail(e),
        };

        self.set_state(SessionState::Connecting);
        tracing::info!(session = %self.label, model = %self.config.model, "Connecting to upstream");

        let ws_stream = match tokio_tungstenite::connect_async(request).await {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => return self.fail(RealtimeError::ConnectionFailed(e.to_string())),
        };

        self.set_state(SessionState::Configuring);
        let (mut write, read) = ws_stream.split();

        if let Err(e) = self.configure(&mut write).await {
            return self.fail(e);
        }

        let (tx, rx) = mpsc::channel::<Outbound>(WS_CHANNEL_CAPACITY);
        let writer = self.spawn_writer(write, rx);
        *self.outbound.lock() = Some(tx);
        *self.writer.lock().await = Some(writer);
        *self.inbound.lock().await = Some(read);

        self.set_state(SessionState::Active);
        tracing::info!(session = %self.label, "Upstream session active");
        Ok(())
    }

    async fn send_audio(&self, frame: Bytes) -> RealtimeResult<()> {
        let state = self.state();
        if !state.accepts_audio() {
            return Err(RealtimeError::NotActive(state));
        }

        let tx = self.sender().ok_or(RealtimeError::NotActive(state))?;
        tx.send(Outbound::Event(ClientEvent::audio_append(&frame)))
            .await
            .map_err(|_| RealtimeError::WebSocketError("Upstream writer stopped".to_string()))?;

        self.stats.record_frame_sent();
        Ok(())
    }

    async fn receive_events(&self) -> RealtimeResult<()> {
        let mut read = self.inbound.lock().await.take().ok_or_else(|| {
            RealtimeError::InvalidState("Event stream unavailable (not connected or already consumed)".into())
        })?;

        let result = loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(session = %self.label, "Event loop cancelled");
                    break Ok(());
                }
                message = read.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                // tungstenite queues the pong itself
                Some(Ok(Message::Ping(data))) => {
                    tracing::trace!(session = %self.label, bytes = data.len(), "Upstream ping");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(session = %self.label, frame = ?frame, "Upstream closed the connection");
                    break Ok(());
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(session = %self.label, bytes = data.len(), "Ignoring binary upstream message");
                }
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => {
                    tracing::info!(session = %self.label, "Upstream connection closed");
                    break Ok(());
                }
                Some(Err(e)) => {
                    self.set_state(SessionState::Errored);
                    break Err(RealtimeError::WebSocketError(e.to_string()));
                }
            }
        };

        tracing::info!(session = %self.label, stats = ?self.stats.snapshot(), "Upstream event loop ended");
        result
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    async fn close(&self) -> RealtimeResult<()> {
        match self.state() {
            SessionState::Closing | SessionState::Closed => return Ok(()),
            SessionState::Unconnected => {
                self.set_state(SessionState::Closed);
                return Ok(());
            }
            _ => self.set_state(SessionState::Closing),
        }

        self.cancel.cancel();
        self.cancel_injections().await;

        let tx = self.outbound.lock().take();
        if let Some(tx) = tx
            && tx.send(Outbound::Close).await.is_err()
        {
            tracing::debug!(session = %self.label, "Writer already stopped before close");
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer
            && tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut writer)
                .await
                .is_err()
        {
            tracing::warn!(session = %self.label, "Upstream writer did not stop in time, aborting");
            writer.abort();
        }

        // drops the read half if the event loop never ran
        self.inbound.lock().await.take();

        self.set_state(SessionState::Closed);
        tracing::info!(session = %self.label, stats = ?self.stats.snapshot(), "Upstream session closed");
        Ok(())
    }

    fn state(&self) -> SessionState {
        *self.state.read()
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
