//! Twilio media stream route
//!
//! # Endpoint
//!
//! `GET /twilio` - WebSocket upgrade for a Twilio `<Connect><Stream>`
//!
//! Twilio sends `connected`, `start`, `media` and `stop` events; the server
//! answers with `media` (assistant audio) and `clear` (barge-in) events.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::core::telephony::MEDIA_STREAM_PATH;
use crate::handlers::twilio_handler;
use crate::state::AppState;
use std::sync::Arc;

pub fn create_twilio_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(twilio_handler))
        .layer(TraceLayer::new_for_http())
}
