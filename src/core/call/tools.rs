//! Tools exposed to the realtime model and their execution.
//!
//! - `query_agent`: forwards the arguments to the configured agent
//! - `save_call_report`: writes `report.json` into the call's log directory
//!
//! Execution never touches the realtime connection. Callers turn the returned
//! output into `conversation.item.create` + `response.create`.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::logger::{REPORT_FILE, timestamp, write_pretty_json};
use crate::core::agent::AgentClient;
use crate::core::realtime::{OutputItem, ResponseBody, ToolDef};

pub const QUERY_AGENT: &str = "query_agent";
pub const SAVE_CALL_REPORT: &str = "save_call_report";

/// Tool schemas advertised in `session.update`.
pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef {
            tool_type: "function".to_string(),
            name: QUERY_AGENT.to_string(),
            description:
                "Query the local/internal agent for facts, actions, or structured answers."
                    .to_string(),
            parameters: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "What you want to ask the internal agent."
                    },
                    "context": {
                        "type": "object",
                        "description": "Optional context for the internal agent."
                    }
                },
                "required": ["question"]
            }),
        },
        ToolDef {
            tool_type: "function".to_string(),
            name: SAVE_CALL_REPORT.to_string(),
            description: "Persist a final call report to disk.".to_string(),
            parameters: json!({
                "type": "object",
                "additionalProperties": true,
                "properties": {
                    "report": {
                        "type": "object",
                        "description": "Arbitrary JSON report."
                    }
                },
                "required": ["report"]
            }),
        },
    ]
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub call_id: String,
    pub arguments: Value,
}

/// Twilio identifiers attached to every agent query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallContext {
    pub call_sid: Option<String>,
    pub stream_sid: Option<String>,
}

/// Outcome of running one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub call_id: String,
    pub name: String,
    /// JSON sent back as `function_call_output`
    pub output: Value,
    /// Failure worth recording in the call log
    pub error: Option<String>,
}

/// Best-effort argument decoding: JSON strings are parsed, unparsable strings
/// become `{"raw": ...}`, anything else is used as-is.
pub fn parse_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        Some(Value::String(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
        }
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Function calls carried by a `response.done` body, in output order.
///
/// Items without a string `name` and `call_id` are skipped.
pub fn function_calls(response: Option<&ResponseBody>) -> Vec<FunctionCall> {
    let Some(response) = response else {
        return Vec::new();
    };
    response.output.iter().filter_map(function_call).collect()
}

fn function_call(item: &OutputItem) -> Option<FunctionCall> {
    if item.item_type.as_deref() != Some("function_call") {
        return None;
    }
    let name = item.name.as_ref()?.as_str()?;
    let call_id = item.call_id.as_ref()?.as_str()?;
    Some(FunctionCall {
        name: name.to_string(),
        call_id: call_id.to_string(),
        arguments: parse_arguments(item.arguments.as_ref()),
    })
}

/// Whether `name` is a tool this bridge answers.
pub fn is_known_tool(name: &str) -> bool {
    name == QUERY_AGENT || name == SAVE_CALL_REPORT
}

/// Agent request body: object arguments extended with `call`, anything else
/// wrapped as `{args, call}`.
pub fn agent_request(arguments: &Value, call: &CallContext) -> Value {
    let call = serde_json::to_value(call).unwrap_or(Value::Null);
    let mut request = match arguments {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("args".to_string(), other.clone());
            map
        }
    };
    request.insert("call".to_string(), call);
    Value::Object(request)
}

/// Run one function call. Returns `None` for tools this bridge does not know.
pub async fn execute(
    call: &FunctionCall,
    agent: Option<&AgentClient>,
    log_dir: &Path,
    context: &CallContext,
) -> Option<ToolOutput> {
    let (output, error) = match call.name.as_str() {
        QUERY_AGENT => query_agent(&call.arguments, agent, context).await,
        SAVE_CALL_REPORT => save_call_report(&call.arguments, log_dir).await,
        other => {
            debug!(tool = %other, call_id = %call.call_id, "Ignoring unknown tool");
            return None;
        }
    };

    Some(ToolOutput {
        call_id: call.call_id.clone(),
        name: call.name.clone(),
        output,
        error,
    })
}

async fn query_agent(
    arguments: &Value,
    agent: Option<&AgentClient>,
    context: &CallContext,
) -> (Value, Option<String>) {
    let Some(agent) = agent else {
        return (json!({ "error": "No agent configured" }), None);
    };

    match agent.query(&agent_request(arguments, context)).await {
        Ok(result) => (json!({ "ok": true, "result": result }), None),
        Err(e) => {
            let message = e.to_string();
            (json!({ "ok": false, "error": message }), Some(message))
        }
    }
}

async fn save_call_report(arguments: &Value, log_dir: &Path) -> (Value, Option<String>) {
    let path = log_dir.join(REPORT_FILE);
    let report = json!({ "t": timestamp(), "args": arguments });

    match write_pretty_json(&path, &report).await {
        Ok(()) => (
            json!({ "ok": true, "path": path.to_string_lossy() }),
            None,
        ),
        Err(e) => {
            let message = format!("Failed to write {}: {}", path.display(), e);
            (json!({ "ok": false, "error": message }), Some(message))
        }
    }
}
