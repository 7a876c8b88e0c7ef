//! Layering YAML values over the environment-derived configuration.

use std::path::PathBuf;

use super::env::{load_from_env, parse_injection_mode, tls_pair};
use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig};

/// Load the environment configuration and apply YAML overrides on top.
///
/// Only values present in the YAML replace environment values; absent
/// sections and fields leave the environment (or default) value in place.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            config.tls = if tls.enabled == Some(false) {
                None
            } else {
                match tls_pair(tls.cert_path, tls.key_path, "server.tls")? {
                    Some(pair) => Some(pair),
                    None => config.tls.take(),
                }
            };
        }
    }

    if let Some(upstream) = yaml.upstream {
        if let Some(api_key) = upstream.api_key.filter(|k| !k.trim().is_empty()) {
            config.openai_api_key = Some(api_key);
        }
        if let Some(url) = upstream.url {
            config.upstream_url = url;
        }
        if let Some(model) = upstream.model {
            config.model = model;
        }
        if let Some(voice) = upstream.voice {
            config.voice = voice;
        }
        if let Some(model) = upstream.transcription_model {
            config.transcription_model = model;
        }
        if let Some(vad) = upstream.vad {
            if let Some(threshold) = vad.threshold {
                config.turn_detection.threshold = threshold;
            }
            if let Some(padding) = vad.prefix_padding_ms {
                config.turn_detection.prefix_padding_ms = padding;
            }
            if let Some(silence) = vad.silence_duration_ms {
                config.turn_detection.silence_duration_ms = silence;
            }
        }
    }

    if let Some(persona) = yaml.persona {
        if let Some(instructions) = persona.instructions {
            config.persona_instructions = instructions;
        }
        if let Some(greeting) = persona.greeting {
            config.greeting_instructions = Some(greeting.trim().to_string()).filter(|g| !g.is_empty());
        }
    }

    if let Some(context) = yaml.context {
        if let Some(summary) = context.summary {
            config.context_summary = summary;
        }
        if let Some(path) = context.full_path {
            config.context_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = context.injection_mode {
            config.injection_mode = parse_injection_mode("context.injection_mode", &raw)?;
        }
        if let Some(enabled) = context.scope_filter {
            config.scope_filter = enabled;
        }
        if let Some(enabled) = context.full_document_on_request {
            config.full_document_on_request = enabled;
        }
        if let Some(keywords) = context.persona_keywords {
            config.persona_keywords = keywords;
        }
    }

    if let Some(audio) = yaml.audio
        && let Some(enabled) = audio.local_playback
    {
        config.local_playback = enabled;
    }

    Ok(config)
}
