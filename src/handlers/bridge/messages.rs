//! Inbound frames and telephony signaling recognized on the caller socket.
//!
//! Binary frames carry caller audio. Text frames are never relayed upstream;
//! they are inspected for the JSON signaling that media-stream providers
//! (Twilio Media Streams, Amazon Connect and similar) send alongside the
//! audio, keyed by an `event` field.

use bytes::Bytes;
use serde::Deserialize;

/// One message from the caller connection, transport details removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Raw PCM16 audio
    Audio(Bytes),
    /// Text frame, inspected for signaling only
    Text(String),
    /// The caller closed the connection or the transport failed
    Close,
}

/// Signaling events understood on the caller connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SignalingEvent {
    /// Transport-level hello
    Connected,

    /// Media stream started
    Start {
        #[serde(default, rename = "streamSid", alias = "stream_sid")]
        stream_sid: Option<String>,
    },

    /// Encoded media inside JSON; not bridged
    Media,

    /// Playback marker acknowledgement
    Mark {
        #[serde(default)]
        mark: Option<MarkInfo>,
    },

    /// A new call is being offered
    IncomingCall,

    /// Media stream stopped; ends the session
    Stop,

    /// Any other `event` value
    #[serde(other)]
    Other,
}

/// Name attached to a playback marker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MarkInfo {
    #[serde(default)]
    pub name: Option<String>,
}

impl SignalingEvent {
    /// Parse a text frame. Returns `None` for anything that is not JSON with
    /// a string `event` field.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Whether this event ends the bridge session.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Stop)
    }
}
