//! Configuration validation logic.

use super::{ConfigError, ServerConfig};
use crate::core::audio::local_playback_supported;
use crate::core::realtime::OpenAIRealtimeVoice;
use crate::core::realtime::openai::build_ws_url;

/// Validate the merged configuration.
///
/// A missing API key is not an error here: the server still starts and each
/// session fails with an authentication error instead.
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_server(config)?;
    validate_upstream(config)?;

    if config.local_playback && !local_playback_supported() {
        tracing::warn!(
            "LOCAL_PLAYBACK is enabled but this build lacks the local-playback feature, audio will not be mirrored"
        );
    }

    Ok(())
}

fn validate_server(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::Validation("port must be non-zero".to_string()));
    }

    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation("host must not be empty".to_string()));
    }

    if let Some(tls) = &config.tls
        && (tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty())
    {
        return Err(ConfigError::Validation(
            "TLS certificate and key paths must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_upstream(config: &ServerConfig) -> Result<(), ConfigError> {
    build_ws_url(&config.upstream_url, &config.model)
        .map_err(|e| ConfigError::Validation(e.to_string()))?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("model must not be empty".to_string()));
    }

    if config.voice.trim().is_empty() {
        return Err(ConfigError::Validation("voice must not be empty".to_string()));
    }
    if OpenAIRealtimeVoice::parse(&config.voice).is_none() {
        tracing::warn!(voice = %config.voice, "Voice is not one of the known voices, passing it through");
    }

    let threshold = config.turn_detection.threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::Validation(format!(
            "VAD threshold must be within 0.0..=1.0, got {threshold}"
        )));
    }

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set, bridge sessions will be rejected");
    }

    Ok(())
}
