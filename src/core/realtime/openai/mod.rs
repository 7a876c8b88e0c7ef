//! OpenAI Realtime API module.
//!
//! One WebSocket per call carries caller audio up and synthesized audio back.
//! The session is configured once with persona instructions and a background
//! summary; afterwards every transcribed caller utterance triggers a
//! `response.create` carrying a retrieved excerpt of the background document.
//!
//! # Audio Format
//!
//! PCM 16-bit signed little-endian, mono, 16 kHz, base64 encoded on the wire.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use realtime_bridge::core::audio::AudioSink;
//! use realtime_bridge::core::context::ContextStore;
//! use realtime_bridge::core::realtime::{OpenAIRealtime, RealtimeConfig, RealtimeUpstream};
//!
//! let (caller_tx, caller_rx) = tokio::sync::mpsc::channel(64);
//! let config = RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     ..Default::default()
//! };
//!
//! let upstream = Arc::new(OpenAIRealtime::new(
//!     config,
//!     Arc::new(ContextStore::default()),
//!     AudioSink::new(caller_tx),
//! ));
//! upstream.connect().await?;
//! upstream.send_audio(frame).await?;
//! ```

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    AUDIO_FORMAT_PCM16, DEFAULT_GREETING, DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL,
    DEFAULT_REALTIME_VOICE, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
    build_ws_url, context_instructions, session_instructions,
};
pub use messages::{
    ApiError, ClientEvent, InputAudioTranscription, ResponseConfig, ResponseInfo, ServerEvent,
    SessionConfig, SessionInfo, TurnDetection, event_type,
};
