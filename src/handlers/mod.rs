//! HTTP and WebSocket request handlers
//!
//! - `api` - health check and TwiML
//! - `twilio` - Twilio Media Streams WebSocket

pub mod api;
pub mod twilio;

pub use twilio::twilio_handler;
