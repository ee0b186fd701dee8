//! External agent client.
//!
//! The realtime model reaches out to a local or internal "agent" through the
//! `query_agent` tool. Two transports are supported and both expose the same
//! `query`/`close` surface:
//!
//! - [`HttpAgent`]: one JSON `POST` per query
//! - [`SubprocessAgent`]: a long-lived child process speaking newline-delimited
//!   JSON over stdin/stdout, with replies correlated by request id
//!
//! ```text
//! -> {"id":"<uuid>","type":"query","args":{...}}
//! <- {"id":"<uuid>","result":{...}}   or   {"id":"<uuid>","error":"..."}
//! ```

mod http;
mod subprocess;

use serde_json::Value;
use thiserror::Error;

pub use http::HttpAgent;
pub use subprocess::SubprocessAgent;

use crate::config::ServerConfig;

/// Errors surfaced by agent queries
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AgentError {
    /// Transport-level failure (connection refused, broken pipe, ...)
    #[error("Agent request failed: {0}")]
    Request(String),

    /// The HTTP agent answered with a non-success status
    #[error("Agent HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The agent replied with an explicit error
    #[error("Agent error: {0}")]
    Remote(String),

    /// The agent process could not be started
    #[error("Failed to start agent process: {0}")]
    Spawn(String),

    /// The agent was closed, or its process exited, while the query was outstanding
    #[error("Agent process closed")]
    Closed,
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Agent transport selected from configuration.
#[derive(Debug, Clone)]
pub enum AgentClient {
    Http(HttpAgent),
    Subprocess(SubprocessAgent),
}

impl AgentClient {
    /// Build the agent configured by `VOX_AGENT_URL` or `VOX_AGENT_CMD`.
    ///
    /// Returns `Ok(None)` when neither is set.
    pub fn from_config(config: &ServerConfig) -> AgentResult<Option<Self>> {
        if let Some(url) = &config.agent_url {
            return Ok(Some(Self::Http(HttpAgent::new(url.as_str()))));
        }
        if let Some(cmd) = &config.agent_cmd {
            return SubprocessAgent::spawn(cmd).map(|agent| Some(Self::Subprocess(agent)));
        }
        Ok(None)
    }

    /// Send one query and wait for its answer.
    pub async fn query(&self, request: &Value) -> AgentResult<Value> {
        match self {
            Self::Http(agent) => agent.query(request).await,
            Self::Subprocess(agent) => agent.query(request).await,
        }
    }

    /// Release the transport. Outstanding queries resolve with [`AgentError::Closed`].
    pub async fn close(&self) {
        match self {
            Self::Http(agent) => agent.close(),
            Self::Subprocess(agent) => agent.close().await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Subprocess(_) => "subprocess",
        }
    }
}
