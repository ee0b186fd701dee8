//! Twilio Media Streams WebSocket message types.
//!
//! Inbound (Twilio → bridge): `connected`, `start`, `media`, `stop`; other
//! events such as `mark` or `dtmf` deserialize to [`TwilioInbound::Other`].
//!
//! Outbound (bridge → Twilio): `media` to play audio, `clear` to flush
//! anything Twilio has buffered for playback.

use serde::{Deserialize, Serialize};

/// Messages received from Twilio.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioInbound {
    Connected,

    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        start: StartMetadata,
    },

    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },

    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },

    #[serde(other)]
    Other,
}

impl TwilioInbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// `start.*` block of the start message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartMetadata {
    #[serde(rename = "streamSid", default)]
    pub stream_sid: Option<String>,
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
}

/// `media.*` block of a media message.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded µ-law audio
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
}

/// Messages sent to Twilio.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TwilioOutbound {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl TwilioOutbound {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        TwilioOutbound::Media {
            stream_sid: stream_sid.into(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        TwilioOutbound::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}
