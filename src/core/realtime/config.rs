//! OpenAI Realtime API configuration types.

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-realtime";

/// Default input transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gpt-4o-transcribe";

/// G.711 µ-law, the only format Twilio media streams carry.
pub const AUDIO_FORMAT_PCMU: &str = "audio/pcmu";

/// Default system prompt for phone calls.
pub const DEFAULT_INSTRUCTIONS: &str = "You are Vox, a natural-sounding phone agent. Keep responses short (<= 2 sentences), ask one question at a time, and prefer confirming numbers/names. When you need information or actions, call the `query_agent` tool. If a tool call takes time, say a brief filler like 'One moment' and then continue. Avoid long lists.";

/// System prompt for the local text simulation.
pub const SIMULATION_INSTRUCTIONS: &str = "You are Vox in a local simulation. Respond naturally but concisely. Prefer calling `query_agent` for facts/actions.";

/// Output modality names.
pub const MODALITY_AUDIO: &str = "audio";
pub const MODALITY_TEXT: &str = "text";

/// Connection parameters for one realtime session.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Base WebSocket endpoint (without query string)
    pub url: String,
    /// Model name
    pub model: String,
}

impl RealtimeConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: model.into(),
        }
    }

    /// Override the endpoint (proxies, local mocks).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Build the WebSocket URL with the model parameter.
    pub fn ws_url(&self) -> String {
        let mut url = match url::Url::parse(&self.url) {
            Ok(url) => url,
            Err(_) => return format!("{}?model={}", self.url, self.model),
        };
        url.query_pairs_mut().append_pair("model", &self.model);
        url.to_string()
    }
}

/// How the realtime session should be configured after `session.created`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub instructions: String,
    pub voice: Option<String>,
    pub transcription_model: Option<String>,
    /// Let server VAD start a response when the caller stops talking
    pub create_response: bool,
    /// Let server VAD interrupt an in-progress response on caller speech
    pub interrupt_response: Option<bool>,
    /// Instructions for a response issued as soon as the session is ready
    pub initial_greeting: Option<String>,
    /// Modalities requested for greetings and explicit responses
    pub output_modalities: Vec<String>,
}

impl SessionSettings {
    /// Phone call defaults: audio only, server VAD drives turn taking.
    pub fn phone(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            voice: None,
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            create_response: true,
            interrupt_response: Some(true),
            initial_greeting: None,
            output_modalities: vec![MODALITY_AUDIO.to_string()],
        }
    }

    /// Text simulation defaults: turns are driven by typed input.
    pub fn simulation() -> Self {
        Self {
            instructions: SIMULATION_INSTRUCTIONS.to_string(),
            voice: None,
            transcription_model: Some(DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            create_response: false,
            interrupt_response: None,
            initial_greeting: None,
            output_modalities: vec![MODALITY_AUDIO.to_string(), MODALITY_TEXT.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_includes_model() {
        let config = RealtimeConfig::new("sk-test", "gpt-realtime");
        assert_eq!(
            config.ws_url(),
            "wss://api.openai.com/v1/realtime?model=gpt-realtime"
        );
    }

    #[test]
    fn test_ws_url_encodes_model() {
        let config = RealtimeConfig::new("sk-test", "my model&x=1").with_url("ws://127.0.0.1:9000/rt");
        assert_eq!(config.ws_url(), "ws://127.0.0.1:9000/rt?model=my+model%26x%3D1");
    }

    #[test]
    fn test_settings_presets() {
        let phone = SessionSettings::phone(DEFAULT_INSTRUCTIONS);
        assert!(phone.create_response);
        assert_eq!(phone.output_modalities, vec!["audio"]);

        let sim = SessionSettings::simulation();
        assert!(!sim.create_response);
        assert_eq!(sim.output_modalities, vec!["audio", "text"]);
    }
}
