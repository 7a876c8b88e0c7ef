//! OpenAI Realtime API WebSocket message types.
//!
//! All events are JSON objects discriminated by their `type` field.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Configure the session (sent exactly once)
//! - input_audio_buffer.append - Append caller audio to the input buffer
//! - response.create - Request a response with per-response instructions
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.completed - Caller transcript
//! - response.created / response.done
//! - response.output_audio.delta / done - Synthesized audio
//! - response.output_audio_transcript.delta / done - Assistant transcript
//! - error
//!
//! The older `response.audio.*` and `response.audio_transcript.*` names are
//! accepted as aliases. Any other event type decodes to [`ServerEvent::Unknown`].

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::AUDIO_FORMAT_PCM16;
use crate::core::realtime::base::{RealtimeError, RealtimeResult, TurnDetectionConfig};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent in `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session kind, always "realtime"
    #[serde(rename = "type")]
    pub session_type: String,

    /// Persona instructions
    pub instructions: String,

    /// Voice for audio output
    pub voice: String,

    /// Input audio format
    pub input_audio_format: String,

    /// Output audio format
    pub output_audio_format: String,

    /// Caller audio transcription
    pub input_audio_transcription: InputAudioTranscription,

    /// Turn detection
    pub turn_detection: TurnDetection,
}

impl SessionConfig {
    /// PCM16 in and out, server VAD, caller transcription enabled.
    pub fn new(
        instructions: impl Into<String>,
        voice: impl Into<String>,
        transcription_model: impl Into<String>,
        turn_detection: TurnDetectionConfig,
    ) -> Self {
        Self {
            session_type: "realtime".to_string(),
            instructions: instructions.into(),
            voice: voice.into(),
            input_audio_format: AUDIO_FORMAT_PCM16.to_string(),
            output_audio_format: AUDIO_FORMAT_PCM16.to_string(),
            input_audio_transcription: InputAudioTranscription {
                model: transcription_model.into(),
            },
            turn_detection: TurnDetection::ServerVad {
                threshold: turn_detection.threshold,
                prefix_padding_ms: turn_detection.prefix_padding_ms,
                silence_duration_ms: turn_detection.silence_duration_ms,
            },
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
}

/// Per-response settings sent in `response.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Output modalities; audio only for calls
    pub modalities: Vec<String>,
    /// Instructions for this response only
    pub instructions: String,
    /// Voice for this response
    pub voice: String,
}

// =============================================================================
// Client Events
// =============================================================================

/// Events sent to the upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure the session
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Request a response
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseConfig },
}

impl ClientEvent {
    /// Create an audio append event from raw PCM bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        Self::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Create an audio-only response request.
    pub fn audio_response(instructions: impl Into<String>, voice: impl Into<String>) -> Self {
        Self::ResponseCreate {
            response: ResponseConfig {
                modalities: vec!["audio".to_string()],
                instructions: instructions.into(),
                voice: voice.into(),
            },
        }
    }

    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ResponseCreate { .. } => "response.create",
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> RealtimeResult<String> {
        serde_json::to_string(self).map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Events received from the upstream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error { error: ApiError },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: SessionInfo,
    },

    /// Session configuration applied
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: SessionInfo,
    },

    /// Server VAD detected the start of speech
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
    },

    /// Server VAD detected the end of speech
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
    },

    /// Caller utterance transcribed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        item_id: String,
        transcript: String,
    },

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: ResponseInfo,
    },

    /// Response generation finished
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseInfo,
    },

    /// Base64 audio chunk
    #[serde(rename = "response.output_audio.delta", alias = "response.audio.delta")]
    AudioDelta {
        delta: String,
        #[serde(default)]
        response_id: String,
    },

    /// Audio for the current response complete
    #[serde(rename = "response.output_audio.done", alias = "response.audio.done")]
    AudioDone {
        #[serde(default)]
        response_id: String,
    },

    /// Assistant transcript chunk
    #[serde(
        rename = "response.output_audio_transcript.delta",
        alias = "response.audio_transcript.delta"
    )]
    AudioTranscriptDelta {
        #[serde(default)]
        delta: String,
    },

    /// Assistant transcript complete
    #[serde(
        rename = "response.output_audio_transcript.done",
        alias = "response.audio_transcript.done"
    )]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    /// Any event type not listed above
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode a text frame.
    pub fn parse(text: &str) -> RealtimeResult<Self> {
        serde_json::from_str(text).map_err(|e| RealtimeError::ProtocolError(e.to_string()))
    }

    /// Decode the base64 payload of an audio delta.
    pub fn decode_audio_delta(delta: &str) -> RealtimeResult<Vec<u8>> {
        BASE64_STANDARD
            .decode(delta)
            .map_err(|e| RealtimeError::ProtocolError(format!("Invalid audio delta: {e}")))
    }
}

/// Extract the `type` field of a raw event, for logging unknown events.
pub fn event_type(text: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Tagged {
        #[serde(rename = "type")]
        kind: String,
    }

    serde_json::from_str::<Tagged>(text).ok().map(|t| t.kind)
}

/// API error details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human readable message
    #[serde(default)]
    pub message: String,
    /// Client event ID that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Session details echoed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Response details echoed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_session_update_serialization() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::new(
                "Be brief.",
                "alloy",
                "whisper-1",
                TurnDetectionConfig::default(),
            ),
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "session.update",
                "session": {
                    "type": "realtime",
                    "instructions": "Be brief.",
                    "voice": "alloy",
                    "input_audio_format": "pcm16",
                    "output_audio_format": "pcm16",
                    "input_audio_transcription": {"model": "whisper-1"},
                    "turn_detection": {
                        "type": "server_vad",
                        "threshold": 0.5,
                        "prefix_padding_ms": 300,
                        "silence_duration_ms": 500
                    }
                }
            })
        );
    }

    #[test]
    fn test_audio_append() {
        let event = ClientEvent::audio_append(&[0x00, 0x01, 0x02, 0x03]);
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "input_audio_buffer.append");
        assert_eq!(value["audio"], "AAECAw==");
        assert_eq!(event.kind(), "input_audio_buffer.append");
    }

    #[test]
    fn test_response_create_serialization() {
        let event = ClientEvent::audio_response("Say hi", "alloy");
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "response.create",
                "response": {
                    "modalities": ["audio"],
                    "instructions": "Say hi",
                    "voice": "alloy"
                }
            })
        );
    }

    #[test]
    fn test_transcription_completed() {
        let event = ServerEvent::parse(
            r#"{"type":"conversation.item.input_audio_transcription.completed","item_id":"item_1","content_index":0,"transcript":"what are your skills"}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            ServerEvent::TranscriptionCompleted {
                item_id: "item_1".to_string(),
                transcript: "what are your skills".to_string(),
            }
        );
    }

    #[test]
    fn test_audio_delta_and_legacy_alias() {
        let current =
            ServerEvent::parse(r#"{"type":"response.output_audio.delta","delta":"AAE="}"#).unwrap();
        let legacy = ServerEvent::parse(
            r#"{"type":"response.audio.delta","delta":"AAE=","response_id":"r1"}"#,
        )
        .unwrap();

        assert!(matches!(current, ServerEvent::AudioDelta { ref delta, .. } if delta == "AAE="));
        assert!(matches!(legacy, ServerEvent::AudioDelta { ref response_id, .. } if response_id == "r1"));
        assert_eq!(ServerEvent::decode_audio_delta("AAE=").unwrap(), vec![0x00, 0x01]);
        assert!(ServerEvent::decode_audio_delta("%%%").is_err());
    }

    #[test]
    fn test_error_event() {
        let event = ServerEvent::parse(
            r#"{"type":"error","error":{"type":"invalid_request_error","code":"bad","message":"nope"}}"#,
        )
        .unwrap();

        match event {
            ServerEvent::Error { error } => {
                assert_eq!(error.error_type, "invalid_request_error");
                assert_eq!(error.code.as_deref(), Some("bad"));
                assert_eq!(error.message, "nope");
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_session_created_without_details() {
        let event = ServerEvent::parse(r#"{"type":"session.created"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::SessionCreated {
                session: SessionInfo::default()
            }
        );
    }

    #[test]
    fn test_unknown_event_type() {
        let raw = r#"{"type":"rate_limits.updated","rate_limits":[]}"#;
        assert_eq!(ServerEvent::parse(raw).unwrap(), ServerEvent::Unknown);
        assert_eq!(event_type(raw).as_deref(), Some("rate_limits.updated"));
    }

    #[test]
    fn test_malformed_events_are_protocol_errors() {
        assert!(matches!(
            ServerEvent::parse("not json"),
            Err(RealtimeError::ProtocolError(_))
        ));
        assert!(matches!(
            ServerEvent::parse(r#"{"no_type":true}"#),
            Err(RealtimeError::ProtocolError(_))
        ));
        // known type, missing required field
        assert!(matches!(
            ServerEvent::parse(r#"{"type":"response.output_audio.delta"}"#),
            Err(RealtimeError::ProtocolError(_))
        ));
        assert!(event_type("not json").is_none());
    }
}
