//! Mock servers for integration tests
//!
//! - `realtime_mock`: scripted OpenAI Realtime WebSocket endpoint

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod realtime_mock;
