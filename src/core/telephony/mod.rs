//! Twilio integration: Media Streams messages, TwiML, and the REST dialer.

mod messages;
mod rest;
mod twiml;

use thiserror::Error;

pub use messages::{MediaPayload, OutboundMedia, StartMetadata, TwilioInbound, TwilioOutbound};
pub use rest::{DialResult, TWILIO_API_BASE, TwilioRestClient};
pub use twiml::{escape_xml, twiml_for_stream, ws_url_from_public_base};

/// Path Twilio connects its media stream to.
pub const MEDIA_STREAM_PATH: &str = "/twilio";

/// Errors from the Twilio REST API.
#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("Missing TWILIO_ACCOUNT_SID/TWILIO_AUTH_TOKEN")]
    MissingCredentials,

    #[error("Twilio request failed: {0}")]
    Request(String),

    #[error("Twilio {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Twilio response missing string {0}")]
    InvalidResponse(&'static str),
}

pub type TelephonyResult<T> = Result<T, TelephonyError>;
