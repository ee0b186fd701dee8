use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::error;

use crate::core::telephony::{MEDIA_STREAM_PATH, twiml_for_stream, ws_url_from_public_base};
use crate::state::AppState;

pub const MISSING_PUBLIC_BASE_URL: &str =
    "Missing VOX_PUBLIC_BASE_URL (must be a public https URL Twilio can reach).";

/// Liveness probe.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// TwiML that connects an answered call to this server's media stream.
pub async fn twiml(State(state): State<Arc<AppState>>) -> Response {
    let Some(base) = state.config.public_base_url.as_ref() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            MISSING_PUBLIC_BASE_URL,
        )
            .into_response();
    };

    match ws_url_from_public_base(base, MEDIA_STREAM_PATH) {
        Ok(ws_url) => (
            [(header::CONTENT_TYPE, "text/xml")],
            twiml_for_stream(ws_url.as_str()),
        )
            .into_response(),
        Err(e) => {
            error!("Cannot derive media stream URL from {}: {}", base, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Invalid VOX_PUBLIC_BASE_URL: {e}"),
            )
                .into_response()
        }
    }
}
