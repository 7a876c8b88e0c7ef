//! Upstream realtime conversation module.
//!
//! The bridge drives an upstream through the [`RealtimeUpstream`] trait; the
//! only implementation is the OpenAI Realtime API client. Tests substitute
//! their own implementation or a mock WebSocket server.

mod base;
pub mod openai;

pub use base::{
    ErrorClass, InjectionMode, RealtimeConfig, RealtimeError, RealtimeResult, RealtimeUpstream,
    SessionState, SessionStats, StatsSnapshot, TurnDetectionConfig, validate_api_key,
};
pub use openai::{OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeVoice};
