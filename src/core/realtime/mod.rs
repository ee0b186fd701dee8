//! OpenAI Realtime API connection.
//!
//! The bridge treats the realtime model as a duplex event stream:
//! [`ClientEvent`]s go out through a [`RealtimeHandle`], server events come
//! back as raw JSON in [`RealtimeEvent::Message`] and are interpreted with
//! [`ServerEvent::from_value`].
//!
//! # Audio Format
//!
//! Both directions use G.711 µ-law at 8 kHz (`audio/pcmu`) so Twilio payloads
//! pass through without transcoding.

mod client;
mod config;
mod messages;

use thiserror::Error;

pub use client::{RealtimeEvent, RealtimeHandle, connect};
pub use config::{
    AUDIO_FORMAT_PCMU, DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL,
    MODALITY_AUDIO, MODALITY_TEXT, OPENAI_REALTIME_URL, RealtimeConfig, SIMULATION_INSTRUCTIONS,
    SessionSettings,
};
pub use messages::{
    ApiError, AudioConfig, AudioFormat, AudioInputConfig, AudioOutputConfig, ClientEvent,
    ContentPart, ConversationItem, InputAudioTranscription, OutputItem, ResponseBody,
    ResponseConfig, ServerEvent, SessionConfig, ToolDef, TurnDetection,
};

/// Errors that can occur on the realtime connection.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<&crate::config::ServerConfig> for RealtimeConfig {
    fn from(config: &crate::config::ServerConfig) -> Self {
        RealtimeConfig::new(
            config.openai_api_key.clone(),
            config.openai_realtime_model.clone(),
        )
        .with_url(config.openai_realtime_url.clone())
    }
}

impl From<&crate::config::ServerConfig> for SessionSettings {
    fn from(config: &crate::config::ServerConfig) -> Self {
        let mut settings = SessionSettings::phone(config.instructions.clone());
        settings.voice = config.openai_realtime_voice.clone();
        settings.transcription_model = config.openai_transcription_model.clone();
        settings.initial_greeting = config.initial_greeting.clone();
        settings
    }
}
