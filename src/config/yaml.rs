use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional so a file may configure only part of the bridge.
/// Values present in the file take precedence over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///   public_base_url: "https://vox.example.com"
///   log_dir: "/var/log/vox"
///
/// openai:
///   api_key: "sk-..."
///   realtime_model: "gpt-realtime"
///   realtime_voice: "marin"
///   transcription_model: "gpt-4o-transcribe"
///
/// agent:
///   url: "http://localhost:8787/query"
///   # or
///   # cmd: "node ./agent.js"
///
/// session:
///   instructions: "You are a helpful receptionist."
///   initial_greeting: "Greet the caller and ask how you can help."
///   audio_queue_capacity: 200
///
/// twilio:
///   account_sid: "AC..."
///   auth_token: "..."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub agent: Option<AgentYaml>,
    pub session: Option<SessionYaml>,
    pub twilio: Option<TwilioYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_base_url: Option<String>,
    pub log_dir: Option<String>,
}

/// OpenAI Realtime settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_voice: Option<String>,
    pub transcription_model: Option<String>,
}

/// Agent transport from YAML (set at most one)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub url: Option<String>,
    pub cmd: Option<String>,
}

/// Per-call session behavior from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub instructions: Option<String>,
    pub initial_greeting: Option<String>,
    pub audio_queue_capacity: Option<usize>,
}

/// Twilio REST credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }
}
