use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8765
///   tls:
///     cert_path: "/etc/bridge/cert.pem"
///     key_path: "/etc/bridge/key.pem"
///
/// upstream:
///   api_key: "sk-..."
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-mini-realtime-preview-2024-12-17"
///   voice: "alloy"
///   transcription_model: "whisper-1"
///   vad:
///     threshold: 0.5
///     prefix_padding_ms: 300
///     silence_duration_ms: 500
///
/// persona:
///   instructions: "You are Alex, a backend engineer. Answer briefly."
///   greeting: "Say hello and introduce yourself in one sentence."
///
/// context:
///   summary: "Backend engineer, 8 years of Java and Kubernetes."
///   full_path: "/etc/bridge/resume.txt"
///   injection_mode: "concurrent"
///   scope_filter: false
///   full_document_on_request: false
///
/// audio:
///   local_playback: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub upstream: Option<UpstreamYaml>,
    pub persona: Option<PersonaYaml>,
    pub context: Option<ContextYaml>,
    pub audio: Option<AudioYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    /// Set to false to disable TLS configured through the environment
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Upstream realtime API settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub transcription_model: Option<String>,
    pub vad: Option<VadYaml>,
}

/// Server VAD tuning from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

/// Persona prompts from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PersonaYaml {
    pub instructions: Option<String>,
    /// Empty string disables the greeting
    pub greeting: Option<String>,
}

/// Background context settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ContextYaml {
    pub summary: Option<String>,
    pub full_path: Option<String>,
    pub injection_mode: Option<String>,
    pub scope_filter: Option<bool>,
    pub full_document_on_request: Option<bool>,
    pub persona_keywords: Option<Vec<String>>,
}

/// Host audio settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub local_playback: Option<bool>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        Ok(serde_yaml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9000
  tls:
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"

upstream:
  api_key: "sk-yaml"
  url: "ws://localhost:9100/v1/realtime"
  model: "gpt-realtime"
  voice: "shimmer"
  transcription_model: "gpt-4o-transcribe"
  vad:
    threshold: 0.7
    silence_duration_ms: 800

persona:
  instructions: "Be Alex."
  greeting: ""

context:
  summary: "Backend engineer."
  full_path: "/tmp/resume.txt"
  injection_mode: "latest_only"
  scope_filter: true
  full_document_on_request: true
  persona_keywords: ["you", "alex"]

audio:
  local_playback: true
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(9000));
        assert_eq!(server.tls.unwrap().key_path.as_deref(), Some("/tmp/key.pem"));

        let upstream = config.upstream.unwrap();
        assert_eq!(upstream.api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(upstream.voice.as_deref(), Some("shimmer"));
        let vad = upstream.vad.unwrap();
        assert_eq!(vad.threshold, Some(0.7));
        assert_eq!(vad.prefix_padding_ms, None);
        assert_eq!(vad.silence_duration_ms, Some(800));

        let persona = config.persona.unwrap();
        assert_eq!(persona.greeting.as_deref(), Some(""));

        let context = config.context.unwrap();
        assert_eq!(context.injection_mode.as_deref(), Some("latest_only"));
        assert_eq!(context.scope_filter, Some(true));
        assert_eq!(context.persona_keywords.unwrap().len(), 2);

        assert_eq!(config.audio.unwrap().local_playback, Some(true));
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
server:
  port: 8080
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.port, Some(8080));
        assert!(server.host.is_none());
        assert!(config.upstream.is_none());
        assert!(config.context.is_none());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.persona.is_none());
        assert!(config.audio.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "upstream:\n  model: \"m1\"\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(config.upstream.unwrap().model.as_deref(), Some("m1"));
    }

    #[test]
    fn test_from_file_not_found() {
        let result = YamlConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "server:\n  port: [not a port\n").unwrap();

        let result = YamlConfig::from_file(&path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML config")
        );
    }
}
