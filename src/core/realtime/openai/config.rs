//! OpenAI Realtime API constants and prompt assembly.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model used when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-mini-realtime-preview-2024-12-17";

/// Voice used when none is configured.
pub const DEFAULT_REALTIME_VOICE: &str = "alloy";

/// Transcription model for caller audio.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Wire name of the only audio format bridged in either direction.
pub const AUDIO_FORMAT_PCM16: &str = "pcm16";

/// Persona instructions used when none are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant. Always speak in English only. \
Keep your responses short and concise - maximum 2 sentences. Be conversational and natural.";

/// Greeting instructions sent right after the session is configured.
pub const DEFAULT_GREETING: &str =
    "Greet the caller warmly in one short sentence and ask how you can help.";

// =============================================================================
// Voices
// =============================================================================

/// Voices accepted by the Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// URL and Prompts
// =============================================================================

/// Build the session URL, adding the `model` query parameter.
///
/// Existing query parameters on `base` are preserved; a `model` already
/// present is replaced.
pub fn build_ws_url(base: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid upstream URL: {e}")))?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(RealtimeError::InvalidConfiguration(format!(
            "Upstream URL must use ws:// or wss://, got {}://",
            url.scheme()
        )));
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "model")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &retained {
            query.append_pair(k, v);
        }
        query.append_pair("model", model);
    }

    Ok(url)
}

/// Persona instructions, followed by the background summary when present.
pub fn session_instructions(persona: &str, summary: &str) -> String {
    let summary = summary.trim();
    if summary.is_empty() {
        persona.to_string()
    } else {
        format!("{persona}\n\nBackground about you:\n{summary}")
    }
}

/// Instructions for a context-injected response.
pub fn context_instructions(transcript: &str, excerpt: &str) -> String {
    format!(
        "The caller just said: \"{transcript}\"\n\n\
         Answer using only the background information below. Speak in the first person, \
         keep it to at most 2 sentences, and say you don't know if the answer is not there.\n\n\
         Background information:\n{excerpt}"
    )
}

// =============================================================================
// Tests
// =============================================================================
