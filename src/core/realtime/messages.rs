//! OpenAI Realtime API WebSocket message types.
//!
//! Client events (sent to server):
//! - session.update - Configure audio formats, turn detection, tools
//! - input_audio_buffer.append - Append caller audio
//! - conversation.item.create - Tool results and typed user input
//! - conversation.item.truncate - Trim assistant audio the caller never heard
//! - response.create - Ask for the next response
//! - response.cancel - Cancel the in-flight response
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - input_audio_buffer.speech_started
//! - response.created
//! - response.output_audio.delta / response.output_audio.done
//! - response.output_text.delta / response.output_text.done
//! - response.done
//! - error
//!
//! Everything else deserializes to [`ServerEvent::Unknown`]. The pre-GA event
//! names (`response.audio.delta`, `response.text.delta`, ...) are accepted as
//! aliases.

use base64::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::config::{AUDIO_FORMAT_PCMU, SessionSettings};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    /// Session type (always "realtime")
    #[serde(rename = "type")]
    pub session_type: String,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Audio input/output configuration
    pub audio: AudioConfig,

    /// Tool definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDef>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioConfig {
    pub input: AudioInputConfig,
    pub output: AudioOutputConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioInputConfig {
    pub format: AudioFormat,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<InputAudioTranscription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioOutputConfig {
    pub format: AudioFormat,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

/// Audio format descriptor, e.g. `{"type": "audio/pcmu"}`.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl AudioFormat {
    pub fn pcmu() -> Self {
        Self {
            format_type: AUDIO_FORMAT_PCMU.to_string(),
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Whether to create a response when the caller stops speaking
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        /// Whether caller speech interrupts the current response
        #[serde(skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },
}

/// Tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    pub description: String,
    /// Function parameters JSON schema
    pub parameters: Value,
}

impl SessionConfig {
    /// Session configuration for µ-law audio in both directions.
    pub fn from_settings(settings: &SessionSettings, tools: Vec<ToolDef>) -> Self {
        Self {
            session_type: "realtime".to_string(),
            instructions: Some(settings.instructions.clone()),
            audio: AudioConfig {
                input: AudioInputConfig {
                    format: AudioFormat::pcmu(),
                    turn_detection: Some(TurnDetection::ServerVad {
                        create_response: Some(settings.create_response),
                        interrupt_response: settings.interrupt_response,
                    }),
                    transcription: settings
                        .transcription_model
                        .clone()
                        .map(|model| InputAudioTranscription { model }),
                },
                output: AudioOutputConfig {
                    format: AudioFormat::pcmu(),
                    voice: settings.voice.clone(),
                },
            },
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools,
        }
    }
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item sent with `conversation.item.create`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationItem {
    /// Item type (message, function_call_output)
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item role for messages (user, assistant, system)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts for messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Call ID the function output answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// JSON-encoded function output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// Result of a tool invocation, `output` is the JSON-encoded result.
    pub fn function_call_output(call_id: impl Into<String>, output: &Value) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            role: None,
            content: None,
            call_id: Some(call_id.into()),
            output: Some(output.to_string()),
        }
    }

    /// Typed user input.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.into()),
            }]),
            call_id: None,
            output: None,
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, Serialize)]
pub struct ContentPart {
    /// Content type (input_text, ...)
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Response Configuration
// =============================================================================

/// Response configuration for `response.create`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseConfig {
    /// Instructions for this response only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Output modalities (audio, text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_modalities: Option<Vec<String>>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: Box<SessionConfig> },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Truncate an assistant item's audio
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    /// Cancel the current response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    pub fn session_update(settings: &SessionSettings, tools: Vec<ToolDef>) -> Self {
        ClientEvent::SessionUpdate {
            session: Box::new(SessionConfig::from_settings(settings, tools)),
        }
    }

    /// Append already base64-encoded audio (Twilio payloads pass through untouched).
    pub fn audio_append(payload: impl Into<String>) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: payload.into(),
        }
    }

    /// Append raw audio bytes.
    pub fn audio_append_bytes(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Plain `response.create` with server-side defaults.
    pub fn response_create() -> Self {
        ClientEvent::ResponseCreate { response: None }
    }

    pub fn response_create_with(
        instructions: Option<String>,
        output_modalities: Option<Vec<String>>,
    ) -> Self {
        ClientEvent::ResponseCreate {
            response: Some(ResponseConfig {
                instructions,
                output_modalities,
            }),
        }
    }

    pub fn truncate(item_id: impl Into<String>, audio_end_ms: u64) -> Self {
        ClientEvent::ConversationItemTruncate {
            item_id: item_id.into(),
            content_index: 0,
            audio_end_ms,
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: &Value) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
        }
    }

    /// Event type string, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ConversationItemTruncate { .. } => "conversation.item.truncate",
            ClientEvent::ResponseCreate { .. } => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<ApiError>,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated,

    /// Session configuration applied
    #[serde(rename = "session.updated")]
    SessionUpdated,

    /// Server VAD detected caller speech
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated,

    /// Audio data chunk
    #[serde(rename = "response.output_audio.delta", alias = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio
        #[serde(default, deserialize_with = "lenient_string")]
        delta: Option<String>,
        #[serde(default, deserialize_with = "lenient_string")]
        item_id: Option<String>,
    },

    /// Audio generation complete
    #[serde(rename = "response.output_audio.done", alias = "response.audio.done")]
    AudioDone,

    /// Text chunk
    #[serde(rename = "response.output_text.delta", alias = "response.text.delta")]
    TextDelta { delta: String },

    /// Text complete
    #[serde(rename = "response.output_text.done", alias = "response.text.done")]
    TextDone,

    /// Response complete, carrying the output items
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default, deserialize_with = "lenient_response")]
        response: Option<ResponseBody>,
    },

    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        ServerEvent::deserialize(value)
    }
}

/// API error details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `response.done`.
///
/// Every field is optional and malformed output items are dropped one by one,
/// so a single bad item never hides the function calls next to it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub output: Vec<OutputItem>,
}

/// One output item of a response. Fields are loose so that partially formed
/// items can be skipped instead of failing the whole event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub call_id: Option<Value>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Any non-string value reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_owned))
}

/// Non-object `response` bodies read as absent.
fn lenient_response<'de, D>(deserializer: D) -> Result<Option<ResponseBody>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(ResponseBody::deserialize(&value).ok())
}

/// Keep the items that parse, skip the rest. A non-array reads as empty.
fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<OutputItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Some(items) = value.as_array() else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| OutputItem::deserialize(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::config::DEFAULT_INSTRUCTIONS;
    use serde_json::json;

    #[test]
    fn test_session_update_shape() {
        let mut settings = SessionSettings::phone(DEFAULT_INSTRUCTIONS);
        settings.voice = Some("marin".to_string());
        let tool = ToolDef {
            tool_type: "function".to_string(),
            name: "query_agent".to_string(),
            description: "Ask".to_string(),
            parameters: json!({"type": "object"}),
        };

        let value = serde_json::to_value(ClientEvent::session_update(&settings, vec![tool])).unwrap();
        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["type"], "realtime");
        assert_eq!(value["session"]["instructions"], DEFAULT_INSTRUCTIONS);
        assert_eq!(value["session"]["audio"]["input"]["format"]["type"], "audio/pcmu");
        assert_eq!(
            value["session"]["audio"]["input"]["turn_detection"],
            json!({"type": "server_vad", "create_response": true, "interrupt_response": true})
        );
        assert_eq!(
            value["session"]["audio"]["input"]["transcription"]["model"],
            "gpt-4o-transcribe"
        );
        assert_eq!(value["session"]["audio"]["output"]["format"]["type"], "audio/pcmu");
        assert_eq!(value["session"]["audio"]["output"]["voice"], "marin");
        assert_eq!(value["session"]["tools"][0]["name"], "query_agent");
        assert_eq!(value["session"]["tool_choice"], "auto");
    }

    #[test]
    fn test_simulation_turn_detection_omits_interrupt() {
        let value =
            serde_json::to_value(ClientEvent::session_update(&SessionSettings::simulation(), vec![]))
                .unwrap();
        assert_eq!(
            value["session"]["audio"]["input"]["turn_detection"],
            json!({"type": "server_vad", "create_response": false})
        );
        assert!(value["session"].get("tools").is_none());
        assert!(value["session"].get("tool_choice").is_none());
        assert!(value["session"]["audio"]["output"].get("voice").is_none());
    }

    #[test]
    fn test_client_event_serialization() {
        assert_eq!(
            serde_json::to_value(ClientEvent::audio_append("AAA=")).unwrap(),
            json!({"type": "input_audio_buffer.append", "audio": "AAA="})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::audio_append_bytes(&[0xFF, 0x7F])).unwrap(),
            json!({"type": "input_audio_buffer.append", "audio": "/38="})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::ResponseCancel).unwrap(),
            json!({"type": "response.cancel"})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::response_create()).unwrap(),
            json!({"type": "response.create"})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::response_create_with(
                Some("Greet".to_string()),
                Some(vec!["audio".to_string()])
            ))
            .unwrap(),
            json!({"type": "response.create", "response": {"instructions": "Greet", "output_modalities": ["audio"]}})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::truncate("item_1", 1500)).unwrap(),
            json!({"type": "conversation.item.truncate", "item_id": "item_1", "content_index": 0, "audio_end_ms": 1500})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::function_call_output("call_1", &json!({"ok": true})))
                .unwrap(),
            json!({
                "type": "conversation.item.create",
                "item": {"type": "function_call_output", "call_id": "call_1", "output": "{\"ok\":true}"}
            })
        );
    }

    #[test]
    fn test_user_text_item() {
        let value = serde_json::to_value(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text("hi there"),
        })
        .unwrap();
        assert_eq!(
            value["item"],
            json!({"type": "message", "role": "user", "content": [{"type": "input_text", "text": "hi there"}]})
        );
    }

    #[test]
    fn test_server_event_parsing() {
        let event = ServerEvent::from_value(&json!({
            "type": "response.output_audio.delta",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "content_index": 0,
            "delta": "//8="
        }))
        .unwrap();
        assert!(
            matches!(event, ServerEvent::AudioDelta { ref delta, ref item_id } if delta.as_deref() == Some("//8=") && item_id.as_deref() == Some("item_1"))
        );

        let legacy = ServerEvent::from_value(&json!({"type": "response.audio.delta", "delta": "AA=="})).unwrap();
        assert!(matches!(legacy, ServerEvent::AudioDelta { item_id: None, .. }));

        let created = ServerEvent::from_value(&json!({"type": "session.created", "session": {"id": "sess_1"}})).unwrap();
        assert!(matches!(created, ServerEvent::SessionCreated));

        let unknown = ServerEvent::from_value(&json!({"type": "rate_limits.updated", "rate_limits": []})).unwrap();
        assert!(matches!(unknown, ServerEvent::Unknown));

        let error = ServerEvent::from_value(&json!({"type": "error", "error": {"type": "invalid_request_error", "message": "bad"}})).unwrap();
        assert!(
            matches!(error, ServerEvent::Error { error: Some(ref e) } if e.message.as_deref() == Some("bad"))
        );
    }

    #[test]
    fn test_response_done_output_items() {
        let event = ServerEvent::from_value(&json!({
            "type": "response.done",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "output": [
                    {"type": "message", "role": "assistant", "content": []},
                    {"type": "function_call", "name": "query_agent", "call_id": "call_1", "arguments": "{\"question\":\"hi\"}"}
                ]
            }
        }))
        .unwrap();

        let ServerEvent::ResponseDone { response: Some(body) } = event else {
            panic!("expected response.done");
        };
        assert_eq!(body.output.len(), 2);
        assert_eq!(body.output[1].item_type.as_deref(), Some("function_call"));
        assert_eq!(body.output[1].name, Some(json!("query_agent")));
    }

    #[test]
    fn test_audio_delta_with_bad_fields_keeps_item_id() {
        let event = ServerEvent::from_value(&json!({
            "type": "response.output_audio.delta",
            "item_id": "item_2",
            "delta": null
        }))
        .unwrap();
        assert!(
            matches!(event, ServerEvent::AudioDelta { delta: None, ref item_id } if item_id.as_deref() == Some("item_2"))
        );

        let event = ServerEvent::from_value(&json!({"type": "response.output_audio.delta", "item_id": 5})).unwrap();
        assert!(matches!(event, ServerEvent::AudioDelta { delta: None, item_id: None }));
    }

    #[test]
    fn test_response_done_skips_malformed_items() {
        let event = ServerEvent::from_value(&json!({
            "type": "response.done",
            "response": {
                "id": 12,
                "output": [
                    null,
                    "junk",
                    {"type": 3, "name": "query_agent"},
                    {"type": "function_call", "name": "query_agent", "call_id": "call_1", "arguments": "{}"}
                ]
            }
        }))
        .unwrap();
        let ServerEvent::ResponseDone { response: Some(body) } = event else {
            panic!("expected response.done");
        };
        assert_eq!(body.id, None);
        assert_eq!(body.output.len(), 1);
        assert_eq!(body.output[0].call_id, Some(json!("call_1")));

        let event = ServerEvent::from_value(&json!({"type": "response.done", "response": {"output": "nope"}})).unwrap();
        assert!(matches!(event, ServerEvent::ResponseDone { response: Some(ref body) } if body.output.is_empty()));

        let event = ServerEvent::from_value(&json!({"type": "response.done", "response": "nope"})).unwrap();
        assert!(matches!(event, ServerEvent::ResponseDone { response: None }));
    }

    #[test]
    fn test_malformed_known_event_fails() {
        assert!(ServerEvent::from_value(&json!({"type": "error", "error": "boom"})).is_err());
    }
}
