pub mod api;
pub mod twilio;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(twilio::create_twilio_router())
        .with_state(state)
}
