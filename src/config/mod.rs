//! Configuration module for the bridge server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use realtime_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::realtime::openai::{
    DEFAULT_GREETING, DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_VOICE,
    DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL,
};
use crate::core::realtime::{InjectionMode, RealtimeConfig, TurnDetectionConfig};

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8765;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the bridge:
/// - Server settings (host, port, TLS)
/// - Upstream realtime API settings (key, endpoint, model, voice, VAD)
/// - Persona prompts
/// - Background context and injection policy
/// - Local playback toggle
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Upstream settings
    /// OpenAI API key; sessions are rejected when missing
    pub openai_api_key: Option<String>,
    pub upstream_url: String,
    pub model: String,
    pub voice: String,
    pub transcription_model: String,
    pub turn_detection: TurnDetectionConfig,

    // Persona
    pub persona_instructions: String,
    /// `None` disables the greeting
    pub greeting_instructions: Option<String>,

    // Background context
    pub context_summary: String,
    pub context_path: Option<PathBuf>,
    pub injection_mode: InjectionMode,
    pub scope_filter: bool,
    pub full_document_on_request: bool,
    /// Extra keywords that mark an utterance as being about the persona
    pub persona_keywords: Vec<String>,

    // Audio
    pub local_playback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tls: None,
            openai_api_key: None,
            upstream_url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_REALTIME_VOICE.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            turn_detection: TurnDetectionConfig::default(),
            persona_instructions: DEFAULT_INSTRUCTIONS.to_string(),
            greeting_instructions: Some(DEFAULT_GREETING.to_string()),
            context_summary: String::new(),
            context_path: None,
            injection_mode: InjectionMode::default(),
            scope_filter: false,
            full_document_on_request: false,
            persona_keywords: Vec::new(),
            local_playback: false,
        }
    }
}

/// Zeroize the API key when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The `.env` file is loaded by `main` before this is called, so its values
    /// are visible here unless overridden by real environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Re-run validation, e.g. after programmatic changes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Per-session upstream configuration derived from this server config.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.upstream_url.clone(),
            model: self.model.clone(),
            voice: self.voice.clone(),
            instructions: self.persona_instructions.clone(),
            greeting: self.greeting_instructions.clone(),
            transcription_model: self.transcription_model.clone(),
            turn_detection: self.turn_detection,
            injection_mode: self.injection_mode,
            scope_filter: self.scope_filter,
            full_document_on_request: self.full_document_on_request,
        }
    }

    /// Human readable dump with the API key masked.
    pub fn redacted_summary(&self) -> String {
        let mut out = String::new();
        let key = match self.openai_api_key.as_deref() {
            Some(key) if key.chars().count() > 8 => {
                let head: String = key.chars().take(3).collect();
                let tail: String = key.chars().skip(key.chars().count() - 4).collect();
                format!("{head}…{tail}")
            }
            Some(_) => "[set]".to_string(),
            None => "[missing]".to_string(),
        };
        let tls = self
            .tls
            .as_ref()
            .map(|t| format!("{} / {}", t.cert_path.display(), t.key_path.display()))
            .unwrap_or_else(|| "disabled".to_string());
        let context = self
            .context_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none (placeholder)".to_string());

        let _ = writeln!(out, "listen:              {}", self.address());
        let _ = writeln!(out, "tls:                 {tls}");
        let _ = writeln!(out, "api key:             {key}");
        let _ = writeln!(out, "upstream url:        {}", self.upstream_url);
        let _ = writeln!(out, "model:               {}", self.model);
        let _ = writeln!(out, "voice:               {}", self.voice);
        let _ = writeln!(out, "transcription model: {}", self.transcription_model);
        let _ = writeln!(
            out,
            "vad:                 threshold={} prefix={}ms silence={}ms",
            self.turn_detection.threshold,
            self.turn_detection.prefix_padding_ms,
            self.turn_detection.silence_duration_ms
        );
        let _ = writeln!(
            out,
            "greeting:            {}",
            if self.greeting_instructions.is_some() { "enabled" } else { "disabled" }
        );
        let _ = writeln!(out, "context summary:     {} chars", self.context_summary.chars().count());
        let _ = writeln!(out, "context document:    {context}");
        let _ = writeln!(out, "injection mode:      {}", self.injection_mode);
        let _ = writeln!(out, "scope filter:        {}", self.scope_filter);
        let _ = writeln!(out, "full on request:     {}", self.full_document_on_request);
        let _ = write!(out, "local playback:      {}", self.local_playback);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_URL",
        "OPENAI_MODEL",
        "OPENAI_VOICE",
        "TRANSCRIPTION_MODEL",
        "VAD_THRESHOLD",
        "VAD_PREFIX_PADDING_MS",
        "VAD_SILENCE_DURATION_MS",
        "PERSONA_INSTRUCTIONS",
        "GREETING_INSTRUCTIONS",
        "CONTEXT_SUMMARY",
        "CONTEXT_PATH",
        "CONTEXT_INJECTION_MODE",
        "CONTEXT_SCOPE_FILTER",
        "CONTEXT_FULL_ON_REQUEST",
        "CONTEXT_PERSONA_KEYWORDS",
        "LOCAL_PLAYBACK",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for key in ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults_from_empty_env() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.address(), "0.0.0.0:8765");
        assert!(!config.is_tls_enabled());
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.model, DEFAULT_REALTIME_MODEL);
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.injection_mode, InjectionMode::Concurrent);
        assert!(config.greeting_instructions.is_some());
        assert!(config.context_summary.is_empty());
        assert!(!config.local_playback);
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("PORT", "9001");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("OPENAI_VOICE", "echo");
            env::set_var("VAD_SILENCE_DURATION_MS", "700");
            env::set_var("CONTEXT_INJECTION_MODE", "latest_only");
            env::set_var("CONTEXT_SCOPE_FILTER", "yes");
            env::set_var("CONTEXT_PERSONA_KEYWORDS", "alex, engineer,");
            env::set_var("CONTEXT_PATH", "/tmp/resume.txt");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.address(), "127.0.0.1:9001");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.voice, "echo");
        assert_eq!(config.turn_detection.silence_duration_ms, 700);
        assert_eq!(config.injection_mode, InjectionMode::LatestOnly);
        assert!(config.scope_filter);
        assert_eq!(config.persona_keywords, vec!["alex", "engineer"]);
        assert_eq!(config.context_path, Some(PathBuf::from("/tmp/resume.txt")));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_empty_greeting_disables() {
        cleanup_env_vars();
        unsafe {
            env::set_var("GREETING_INSTRUCTIONS", "");
        }

        let config = ServerConfig::from_env().unwrap();
        assert!(config.greeting_instructions.is_none());
        assert!(config.realtime_config().greeting.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_env_values() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));

        cleanup_env_vars();
        unsafe {
            env::set_var("LOCAL_PLAYBACK", "sometimes");
        }
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidValue { .. })
        ));

        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Validation(_))
        ));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

upstream:
  api_key: "sk-yaml"
  model: "gpt-realtime"

context:
  injection_mode: "latest_only"
"#;
        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "10.0.0.1");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("OPENAI_VOICE", "coral");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(config.model, "gpt-realtime");
        assert_eq!(config.injection_mode, InjectionMode::LatestOnly);
        // ENV value kept where YAML is silent
        assert_eq!(config.voice, "coral");
        assert_eq!(config.port, 8080);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_tls_disabled_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
            env::set_var("TLS_KEY_PATH", "/tmp/key.pem");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  tls:\n    enabled: false\n").unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert!(!config.is_tls_enabled());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_injection_mode() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "context:\n  injection_mode: \"sometimes\"\n").unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("context.injection_mode"));
    }

    #[test]
    fn test_realtime_config_mapping() {
        let mut config = ServerConfig::default();
        config.openai_api_key = Some("sk-live".to_string());
        config.voice = "verse".to_string();
        config.scope_filter = true;

        let realtime = config.realtime_config();
        assert_eq!(realtime.api_key, "sk-live");
        assert_eq!(realtime.voice, "verse");
        assert_eq!(realtime.url, OPENAI_REALTIME_URL);
        assert!(realtime.scope_filter);
        assert!(realtime.greeting.is_some());
    }

    #[test]
    fn test_redacted_summary_masks_key() {
        let mut config = ServerConfig::default();
        config.openai_api_key = Some("sk-proj-abcdefghijklmnop".to_string());

        let summary = config.redacted_summary();
        assert!(!summary.contains("abcdefghijklmnop"));
        assert!(summary.contains("sk-…mnop"));
        assert!(summary.contains("injection mode:      concurrent"));

        config.openai_api_key = None;
        assert!(config.redacted_summary().contains("[missing]"));
    }
}
