//! Base traits and types for the upstream realtime conversation.
//!
//! This module defines the error taxonomy, the session lifecycle, the
//! per-session counters and the trait the bridge orchestrator drives.
//!
//! # Audio Format
//!
//! Audio is PCM 16-bit signed little-endian, mono, 16 kHz in both directions.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Credential missing or obviously a placeholder
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Connection to the upstream failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error on an established connection
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Operation requires an active session
    #[error("Session not active (state: {0})")]
    NotActive(SessionState),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Upstream message could not be decoded
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Outgoing event could not be encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification used for logging and teardown decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad or missing configuration; fatal before any socket work
    Configuration,
    /// Connection-level failure; ends the session
    Transport,
    /// A single malformed message; the session continues
    Protocol,
}

impl RealtimeError {
    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthenticationFailed(_) | Self::InvalidConfiguration(_) => {
                ErrorClass::Configuration
            }
            Self::ConnectionFailed(_)
            | Self::WebSocketError(_)
            | Self::NotActive(_)
            | Self::InvalidState(_) => ErrorClass::Transport,
            Self::ProtocolError(_) | Self::SerializationError(_) => ErrorClass::Protocol,
        }
    }

    /// Whether the session must be torn down after this error.
    pub fn is_fatal(&self) -> bool {
        self.class() != ErrorClass::Protocol
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Reject a missing or placeholder API key before any network activity.
pub fn validate_api_key(api_key: &str) -> RealtimeResult<()> {
    let key = api_key.trim();
    if key.is_empty() {
        return Err(RealtimeError::AuthenticationFailed(
            "API key is required".to_string(),
        ));
    }
    if key.starts_with("sk-xxxx") {
        return Err(RealtimeError::AuthenticationFailed(
            "API key is a placeholder, set a real key".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Session Lifecycle
// =============================================================================

/// Lifecycle of one upstream session.
///
/// `Unconnected -> Connecting -> Configuring -> Active -> Closing -> Closed`,
/// with `Errored` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing attempted yet
    #[default]
    Unconnected,
    /// Opening the WebSocket
    Connecting,
    /// Socket open, sending the session configuration
    Configuring,
    /// Configured; audio may flow
    Active,
    /// Teardown in progress
    Closing,
    /// Socket closed
    Closed,
    /// Transport failure; absorbing
    Errored,
}

impl SessionState {
    /// Closed and Errored accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Whether audio frames may be sent upstream.
    pub fn accepts_audio(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Configuring => "configuring",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// How transcript-triggered context injections may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMode {
    /// Every transcript spawns its own injection; in-flight ones keep running
    #[default]
    Concurrent,
    /// A new transcript aborts injections that have not yet been sent
    LatestOnly,
}

impl FromStr for InjectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "latest_only" | "latest" => Ok(Self::LatestOnly),
            other => Err(format!(
                "Unknown injection mode '{other}', expected 'concurrent' or 'latest_only'"
            )),
        }
    }
}

impl fmt::Display for InjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => write!(f, "concurrent"),
            Self::LatestOnly => write!(f, "latest_only"),
        }
    }
}

/// Server-side voice activity detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnDetectionConfig {
    /// Activation threshold (0.0 to 1.0)
    pub threshold: f32,
    /// Audio kept before detected speech, in milliseconds
    pub prefix_padding_ms: u32,
    /// Silence that ends a turn, in milliseconds
    pub silence_duration_ms: u32,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Per-session configuration of the upstream client.
#[derive(Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// WebSocket endpoint without query string
    pub url: String,

    /// Model name passed as the `model` query parameter
    pub model: String,

    /// Voice for synthesized audio
    pub voice: String,

    /// Persona instructions sent once in the session configuration
    pub instructions: String,

    /// Instructions for the greeting response; `None` disables the greeting
    pub greeting: Option<String>,

    /// Model used to transcribe caller audio
    pub transcription_model: String,

    /// Server VAD settings
    pub turn_detection: TurnDetectionConfig,

    /// Overlap policy for context injections
    pub injection_mode: InjectionMode,

    /// Only inject context for utterances about the persona
    pub scope_filter: bool,

    /// Inject the whole document when the caller asks for detail
    pub full_document_on_request: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: super::openai::OPENAI_REALTIME_URL.to_string(),
            model: super::openai::DEFAULT_REALTIME_MODEL.to_string(),
            voice: super::openai::DEFAULT_REALTIME_VOICE.to_string(),
            instructions: super::openai::DEFAULT_INSTRUCTIONS.to_string(),
            greeting: Some(super::openai::DEFAULT_GREETING.to_string()),
            transcription_model: super::openai::DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            turn_detection: TurnDetectionConfig::default(),
            injection_mode: InjectionMode::default(),
            scope_filter: false,
            full_document_on_request: false,
        }
    }
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("api_key", &"[redacted]")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("greeting", &self.greeting.is_some())
            .field("transcription_model", &self.transcription_model)
            .field("turn_detection", &self.turn_detection)
            .field("injection_mode", &self.injection_mode)
            .field("scope_filter", &self.scope_filter)
            .field("full_document_on_request", &self.full_document_on_request)
            .finish()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Lock-free per-session counters.
#[derive(Debug, Default)]
pub struct SessionStats {
    audio_frames_sent: AtomicU64,
    audio_chunks_received: AtomicU64,
    transcripts: AtomicU64,
    injections_sent: AtomicU64,
    upstream_errors: AtomicU64,
    decode_failures: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub audio_frames_sent: u64,
    pub audio_chunks_received: u64,
    pub transcripts: u64,
    pub injections_sent: u64,
    pub upstream_errors: u64,
    pub decode_failures: u64,
}

impl SessionStats {
    pub(crate) fn record_frame_sent(&self) {
        self.audio_frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_audio_received(&self) {
        self.audio_chunks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transcript(&self) {
        self.transcripts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_injection(&self) {
        self.injections_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            audio_frames_sent: self.audio_frames_sent.load(Ordering::Relaxed),
            audio_chunks_received: self.audio_chunks_received.load(Ordering::Relaxed),
            transcripts: self.transcripts.load(Ordering::Relaxed),
            injections_sent: self.injections_sent.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Upstream Trait
// =============================================================================

/// A realtime conversation upstream driven by the bridge orchestrator.
///
/// All methods take `&self` so one instance can be shared between the
/// inbound pump and the spawned event loop.
#[async_trait]
pub trait RealtimeUpstream: Send + Sync + 'static {
    /// Open and configure the session. Audio may only be sent afterwards.
    async fn connect(&self) -> RealtimeResult<()>;

    /// Relay one caller audio frame.
    async fn send_audio(&self, frame: Bytes) -> RealtimeResult<()>;

    /// Consume upstream events until close, transport failure or cancellation.
    async fn receive_events(&self) -> RealtimeResult<()>;

    /// Stop the event loop without closing the socket.
    fn cancel(&self);

    /// Cancel pending injections and close the socket. Idempotent.
    async fn close(&self) -> RealtimeResult<()>;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Current counters.
    fn stats(&self) -> StatsSnapshot;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("sk-live-123").is_ok());
        assert!(matches!(
            validate_api_key(""),
            Err(RealtimeError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            validate_api_key("  "),
            Err(RealtimeError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            validate_api_key("sk-xxxxxxxxxxxx"),
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(
            RealtimeError::AuthenticationFailed("x".into()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            RealtimeError::NotActive(SessionState::Connecting).class(),
            ErrorClass::Transport
        );
        assert_eq!(
            RealtimeError::ProtocolError("bad json".into()).class(),
            ErrorClass::Protocol
        );
        assert!(!RealtimeError::ProtocolError("bad json".into()).is_fatal());
        assert!(RealtimeError::WebSocketError("reset".into()).is_fatal());
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(
            RealtimeError::NotActive(SessionState::Configuring).to_string(),
            "Session not active (state: configuring)"
        );
        assert!(SessionState::Errored.is_terminal());
        assert!(!SessionState::Closing.is_terminal());
        assert!(SessionState::Active.accepts_audio());
        assert!(!SessionState::Configuring.accepts_audio());
    }

    #[test]
    fn test_injection_mode_parse() {
        assert_eq!(
            "concurrent".parse::<InjectionMode>(),
            Ok(InjectionMode::Concurrent)
        );
        assert_eq!(
            "Latest-Only".parse::<InjectionMode>(),
            Ok(InjectionMode::LatestOnly)
        );
        assert!("sometimes".parse::<InjectionMode>().is_err());
        assert_eq!(InjectionMode::LatestOnly.to_string(), "latest_only");
    }

    #[test]
    fn test_default_turn_detection() {
        let td = TurnDetectionConfig::default();
        assert_eq!(td.threshold, 0.5);
        assert_eq!(td.prefix_padding_ms, 300);
        assert_eq!(td.silence_duration_ms, 500);
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = RealtimeConfig {
            api_key: "sk-secret-value".to_string(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = SessionStats::default();
        stats.record_frame_sent();
        stats.record_frame_sent();
        stats.record_injection();
        let snap = stats.snapshot();
        assert_eq!(snap.audio_frames_sent, 2);
        assert_eq!(snap.injections_sent, 1);
        assert_eq!(snap.decode_failures, 0);
    }
}
