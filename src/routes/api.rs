use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Plain HTTP routes: health check and TwiML.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/twiml", get(api::twiml).post(api::twiml))
        .layer(TraceLayer::new_for_http())
}
