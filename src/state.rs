use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared state handed to every request handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self { config })
    }
}
