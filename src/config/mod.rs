//! Configuration module for Vox Gateway
//!
//! Configuration comes from `.env` files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults. The `.env` file
//! is loaded in `main` before any of this runs.
//!
//! # Environment variables
//! - `OPENAI_API_KEY` (required)
//! - `OPENAI_REALTIME_MODEL`, `OPENAI_REALTIME_VOICE`, `OPENAI_TRANSCRIPTION_MODEL`
//! - `VOX_PUBLIC_BASE_URL`: public https base used to build the Twilio stream URL
//! - `VOX_AGENT_URL` or `VOX_AGENT_CMD` (at most one)
//! - `VOX_LOG_DIR`, `VOX_INITIAL_GREETING`, `VOX_INSTRUCTIONS`, `VOX_AUDIO_QUEUE_CAPACITY`
//! - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN` (only needed for `dial`)
//!
//! # Example
//! ```rust,no_run
//! use vox_gateway::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::{
    DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL,
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_AUDIO_QUEUE_CAPACITY: usize = 200;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0}")]
    MissingRequired(&'static str),

    #[error("Set only one of VOX_AGENT_URL or VOX_AGENT_CMD")]
    ConflictingAgent,

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Server configuration
///
/// Contains everything needed to run the bridge:
/// - Server settings (host, port, public base URL, log directory)
/// - OpenAI Realtime credentials and session defaults
/// - Agent transport (HTTP endpoint or subprocess command)
/// - Twilio REST credentials for outbound dialing
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Public https base URL of this server, as reachable by Twilio
    pub public_base_url: Option<Url>,
    /// Per-call logs are written to `<log_dir>/<call id>/`
    pub log_dir: PathBuf,

    // OpenAI Realtime
    pub openai_api_key: String,
    pub openai_realtime_url: String,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: Option<String>,
    pub openai_transcription_model: Option<String>,

    // Agent transport
    pub agent_url: Option<Url>,
    pub agent_cmd: Option<String>,

    // Session behavior
    pub instructions: String,
    pub initial_greeting: Option<String>,
    /// Maximum frames buffered per direction while a peer is not ready
    pub audio_queue_capacity: usize,

    // Twilio REST
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        self.openai_api_key.zeroize();
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Configuration with defaults everywhere except the API key.
    pub fn new(openai_api_key: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_base_url: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            openai_api_key: openai_api_key.into(),
            openai_realtime_url: OPENAI_REALTIME_URL.to_string(),
            openai_realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            openai_realtime_voice: None,
            openai_transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            agent_url: None,
            agent_cmd: None,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            initial_greeting: None,
            audio_queue_capacity: DEFAULT_AUDIO_QUEUE_CAPACITY,
            twilio_account_sid: None,
            twilio_auth_token: None,
        }
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration from a YAML file on top of environment variables.
    ///
    /// Values present in the file override the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path)?;
        Self::load(Some(yaml))
    }

    fn load(yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let yaml = yaml.unwrap_or_default();
        let server = yaml.server.unwrap_or_default();
        let openai = yaml.openai.unwrap_or_default();
        let agent = yaml.agent.unwrap_or_default();
        let session = yaml.session.unwrap_or_default();
        let twilio = yaml.twilio.unwrap_or_default();

        let openai_api_key = pick(openai.api_key, "OPENAI_API_KEY")
            .ok_or(ConfigError::MissingRequired("OPENAI_API_KEY"))?;

        let port = match server.port {
            Some(port) => port,
            None => match env_var("PORT") {
                Some(raw) => parse_port(&raw)?,
                None => DEFAULT_PORT,
            },
        };

        let public_base_url = pick(server.public_base_url, "VOX_PUBLIC_BASE_URL")
            .map(|raw| parse_url(&raw, "VOX_PUBLIC_BASE_URL"))
            .transpose()?;
        let agent_url = pick(agent.url, "VOX_AGENT_URL")
            .map(|raw| parse_url(&raw, "VOX_AGENT_URL"))
            .transpose()?;

        let audio_queue_capacity = match session.audio_queue_capacity {
            Some(capacity) => capacity,
            None => match env_var("VOX_AUDIO_QUEUE_CAPACITY") {
                Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "VOX_AUDIO_QUEUE_CAPACITY",
                    reason: format!("'{raw}' is not a positive integer"),
                })?,
                None => DEFAULT_AUDIO_QUEUE_CAPACITY,
            },
        };

        let config = Self {
            host: pick(server.host, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            public_base_url,
            log_dir: pick(server.log_dir, "VOX_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            openai_api_key,
            openai_realtime_url: pick(openai.realtime_url, "OPENAI_REALTIME_URL")
                .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
            openai_realtime_model: pick(openai.realtime_model, "OPENAI_REALTIME_MODEL")
                .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
            openai_realtime_voice: pick(openai.realtime_voice, "OPENAI_REALTIME_VOICE"),
            openai_transcription_model: Some(
                pick(openai.transcription_model, "OPENAI_TRANSCRIPTION_MODEL")
                    .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            ),
            agent_url,
            agent_cmd: pick(agent.cmd, "VOX_AGENT_CMD"),
            instructions: pick(session.instructions, "VOX_INSTRUCTIONS")
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            initial_greeting: pick(session.initial_greeting, "VOX_INITIAL_GREETING"),
            audio_queue_capacity,
            twilio_account_sid: pick(twilio.account_sid, "TWILIO_ACCOUNT_SID"),
            twilio_auth_token: pick(twilio.auth_token, "TWILIO_AUTH_TOKEN"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired("OPENAI_API_KEY"));
        }
        if self.agent_url.is_some() && self.agent_cmd.is_some() {
            return Err(ConfigError::ConflictingAgent);
        }
        if self.audio_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "VOX_AUDIO_QUEUE_CAPACITY",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default TwiML URL for outbound calls: `<public base>/twiml`.
    pub fn twiml_url(&self) -> Option<Url> {
        self.public_base_url
            .as_ref()
            .and_then(|base| base.join("/twiml").ok())
    }
}

/// Read an environment variable, trimmed. Empty values count as unset.
fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().and_then(non_empty)
}

/// YAML value if present and non-empty, else the environment variable.
fn pick(yaml: Option<String>, env_name: &str) -> Option<String> {
    yaml.and_then(non_empty).or_else(|| env_var(env_name))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_url(raw: &str, name: &'static str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        name,
        reason: e.to_string(),
    })
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::InvalidValue {
            name: "PORT",
            reason: format!("'{raw}' is not a valid port"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const VARS: &[&str] = &[
        "HOST",
        "PORT",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_URL",
        "OPENAI_REALTIME_MODEL",
        "OPENAI_REALTIME_VOICE",
        "OPENAI_TRANSCRIPTION_MODEL",
        "VOX_PUBLIC_BASE_URL",
        "VOX_AGENT_URL",
        "VOX_AGENT_CMD",
        "VOX_LOG_DIR",
        "VOX_INITIAL_GREETING",
        "VOX_INSTRUCTIONS",
        "VOX_AUDIO_QUEUE_CAPACITY",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    fn set(name: &str, value: &str) {
        unsafe {
            env::set_var(name, value);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        set("OPENAI_API_KEY", "sk-test");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_realtime_model, "gpt-realtime");
        assert_eq!(config.openai_realtime_url, OPENAI_REALTIME_URL);
        assert_eq!(
            config.openai_transcription_model.as_deref(),
            Some("gpt-4o-transcribe")
        );
        assert!(config.openai_realtime_voice.is_none());
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.audio_queue_capacity, 200);
        assert!(config.agent_url.is_none());
        assert!(config.agent_cmd.is_none());
        assert!(config.public_base_url.is_none());
        assert!(config.twiml_url().is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clear_env();
        let err = ServerConfig::from_env().unwrap_err();
        assert_eq!(err.to_string(), "Missing OPENAI_API_KEY");

        set("OPENAI_API_KEY", "   ");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::MissingRequired("OPENAI_API_KEY"))
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_values_are_trimmed_and_empty_is_unset() {
        clear_env();
        set("OPENAI_API_KEY", "  sk-test  ");
        set("OPENAI_REALTIME_VOICE", " marin ");
        set("VOX_INITIAL_GREETING", "");
        set("OPENAI_REALTIME_MODEL", "   ");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_realtime_voice.as_deref(), Some("marin"));
        assert!(config.initial_greeting.is_none());
        assert_eq!(config.openai_realtime_model, "gpt-realtime");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_conflicting_agent() {
        clear_env();
        set("OPENAI_API_KEY", "sk-test");
        set("VOX_AGENT_URL", "http://localhost:8787");
        set("VOX_AGENT_CMD", "node agent.js");

        let err = ServerConfig::from_env().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Set only one of VOX_AGENT_URL or VOX_AGENT_CMD"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values() {
        clear_env();
        set("OPENAI_API_KEY", "sk-test");

        set("PORT", "abc");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidValue { name: "PORT", .. })
        ));
        set("PORT", "0");
        assert!(ServerConfig::from_env().is_err());
        set("PORT", "8080");

        set("VOX_PUBLIC_BASE_URL", "not a url");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidValue {
                name: "VOX_PUBLIC_BASE_URL",
                ..
            })
        ));
        set("VOX_PUBLIC_BASE_URL", "https://vox.example.com");

        set("VOX_AGENT_URL", "not a url");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidValue {
                name: "VOX_AGENT_URL",
                ..
            })
        ));
        set("VOX_AGENT_URL", "http://localhost:9000/agent");

        set("VOX_AUDIO_QUEUE_CAPACITY", "0");
        assert!(ServerConfig::from_env().is_err());
        set("VOX_AUDIO_QUEUE_CAPACITY", "64");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.audio_queue_capacity, 64);
        assert_eq!(
            config.agent_url.as_ref().map(Url::as_str),
            Some("http://localhost:9000/agent")
        );
        assert_eq!(
            config.twiml_url().unwrap().as_str(),
            "https://vox.example.com/twiml"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_yaml_overrides_env() {
        clear_env();
        set("OPENAI_API_KEY", "sk-env");
        set("OPENAI_REALTIME_VOICE", "alloy");
        set("VOX_AGENT_CMD", "node agent.js");

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vox.yaml");
        fs::write(
            &path,
            r#"
server:
  port: 4100
  log_dir: "/tmp/vox-yaml"
openai:
  realtime_voice: "marin"
session:
  initial_greeting: "Hello from YAML"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.openai_api_key, "sk-env");
        assert_eq!(config.port, 4100);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/vox-yaml"));
        assert_eq!(config.openai_realtime_voice.as_deref(), Some("marin"));
        assert_eq!(config.initial_greeting.as_deref(), Some("Hello from YAML"));
        assert_eq!(config.agent_cmd.as_deref(), Some("node agent.js"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_yaml_agent_conflicts_with_env_agent() {
        clear_env();
        set("OPENAI_API_KEY", "sk-env");
        set("VOX_AGENT_CMD", "node agent.js");

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vox.yaml");
        fs::write(&path, "agent:\n  url: \"http://localhost:9000\"\n").unwrap();

        assert!(matches!(
            ServerConfig::from_file(&path),
            Err(ConfigError::ConflictingAgent)
        ));
        clear_env();
    }

    #[test]
    fn test_new_has_defaults() {
        let config = ServerConfig::new("sk-test");
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.audio_queue_capacity, DEFAULT_AUDIO_QUEUE_CAPACITY);
        assert!(config.validate().is_ok());
    }
}
