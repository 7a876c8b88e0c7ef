//! Environment variable loading.
//!
//! `.env` values are already present in the process environment at this
//! point (loaded by `dotenvy` in `main`), so real environment variables win
//! over `.env` simply by being set first.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig, TlsConfig};
use crate::core::realtime::InjectionMode;

/// Read a variable, treating unset and non-UTF-8 values alike.
pub(super) fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Read a variable, ignoring it when blank.
pub(super) fn env_non_empty(key: &str) -> Option<String> {
    env_string(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, failing on malformed values rather than silently defaulting.
pub(super) fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_non_empty(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

/// Parse a boolean flag: true/false, 1/0, yes/no, on/off.
pub(super) fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    env_non_empty(key)
        .map(|raw| {
            parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}' is not a boolean"),
            })
        })
        .transpose()
}

pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an injection mode, naming the offending key on failure.
pub(super) fn parse_injection_mode(key: &str, raw: &str) -> Result<InjectionMode, ConfigError> {
    raw.parse::<InjectionMode>()
        .map_err(|message| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        })
}

/// Build a TLS config from an optional certificate/key pair.
///
/// Both or neither must be given.
pub(super) fn tls_pair(
    cert: Option<String>,
    key: Option<String>,
    source: &str,
) -> Result<Option<TlsConfig>, ConfigError> {
    match (cert, key) {
        (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::Validation(format!(
            "{source}: TLS requires both a certificate and a key path"
        ))),
    }
}

/// Load the configuration from environment variables on top of the defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_non_empty("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse::<u16>("PORT")? {
        config.port = port;
    }
    config.tls = tls_pair(
        env_non_empty("TLS_CERT_PATH"),
        env_non_empty("TLS_KEY_PATH"),
        "TLS_CERT_PATH/TLS_KEY_PATH",
    )?;

    config.openai_api_key = env_non_empty("OPENAI_API_KEY");
    if let Some(url) = env_non_empty("OPENAI_REALTIME_URL") {
        config.upstream_url = url;
    }
    if let Some(model) = env_non_empty("OPENAI_MODEL") {
        config.model = model;
    }
    if let Some(voice) = env_non_empty("OPENAI_VOICE") {
        config.voice = voice;
    }
    if let Some(model) = env_non_empty("TRANSCRIPTION_MODEL") {
        config.transcription_model = model;
    }

    if let Some(threshold) = env_parse::<f32>("VAD_THRESHOLD")? {
        config.turn_detection.threshold = threshold;
    }
    if let Some(padding) = env_parse::<u32>("VAD_PREFIX_PADDING_MS")? {
        config.turn_detection.prefix_padding_ms = padding;
    }
    if let Some(silence) = env_parse::<u32>("VAD_SILENCE_DURATION_MS")? {
        config.turn_detection.silence_duration_ms = silence;
    }

    if let Some(instructions) = env_non_empty("PERSONA_INSTRUCTIONS") {
        config.persona_instructions = instructions;
    }
    // set-but-empty disables the greeting
    if let Some(greeting) = env_string("GREETING_INSTRUCTIONS") {
        config.greeting_instructions = Some(greeting.trim().to_string()).filter(|g| !g.is_empty());
    }

    if let Some(summary) = env_non_empty("CONTEXT_SUMMARY") {
        config.context_summary = summary;
    }
    config.context_path = env_non_empty("CONTEXT_PATH").map(PathBuf::from);
    if let Some(raw) = env_non_empty("CONTEXT_INJECTION_MODE") {
        config.injection_mode = parse_injection_mode("CONTEXT_INJECTION_MODE", &raw)?;
    }
    if let Some(enabled) = env_bool("CONTEXT_SCOPE_FILTER")? {
        config.scope_filter = enabled;
    }
    if let Some(enabled) = env_bool("CONTEXT_FULL_ON_REQUEST")? {
        config.full_document_on_request = enabled;
    }
    if let Some(keywords) = env_non_empty("CONTEXT_PERSONA_KEYWORDS") {
        config.persona_keywords = keywords
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
    }

    if let Some(enabled) = env_bool("LOCAL_PLAYBACK")? {
        config.local_playback = enabled;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" on "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_tls_pair() {
        let tls = tls_pair(Some("c.pem".into()), Some("k.pem".into()), "test")
            .unwrap()
            .unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("c.pem"));
        assert!(tls_pair(None, None, "test").unwrap().is_none());
        assert!(matches!(
            tls_pair(Some("c.pem".into()), None, "test"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_injection_mode_error_names_key() {
        let err = parse_injection_mode("CONTEXT_INJECTION_MODE", "random").unwrap_err();
        assert!(err.to_string().contains("CONTEXT_INJECTION_MODE"));
        assert_eq!(
            parse_injection_mode("k", "latest").unwrap(),
            InjectionMode::LatestOnly
        );
    }
}
