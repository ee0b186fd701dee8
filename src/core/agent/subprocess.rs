use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{self, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AgentError, AgentResult};

type Waiters = HashMap<String, oneshot::Sender<AgentResult<Value>>>;

/// Outstanding queries keyed by request id. `None` once the agent is closed.
type PendingQueries = Arc<Mutex<Option<Waiters>>>;

#[derive(Serialize)]
struct AgentRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    args: &'a Value,
}

#[derive(Deserialize)]
struct AgentReply {
    id: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug)]
struct Inner {
    command: String,
    stdin: sync::Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    pending: PendingQueries,
}

/// Agent running as a child process, spoken to with JSON lines.
#[derive(Debug, Clone)]
pub struct SubprocessAgent {
    inner: Arc<Inner>,
}

impl SubprocessAgent {
    /// Start `command` through the system shell.
    ///
    /// stdin and stdout are piped; stderr is inherited so the agent can log.
    pub fn spawn(command: &str) -> AgentResult<Self> {
        let mut child = shell_command(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Spawn(format!("{command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Spawn("agent stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Spawn("agent stdout unavailable".to_string()))?;

        let pending: PendingQueries = Arc::new(Mutex::new(Some(HashMap::new())));
        tokio::spawn(read_replies(
            stdout,
            Arc::clone(&pending),
            command.to_string(),
        ));

        info!(command = %command, pid = ?child.id(), "Agent process started");

        Ok(Self {
            inner: Arc::new(Inner {
                command: command.to_string(),
                stdin: sync::Mutex::new(Some(stdin)),
                child: Mutex::new(Some(child)),
                pending,
            }),
        })
    }

    pub fn command(&self) -> &str {
        &self.inner.command
    }

    /// Number of queries still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.inner.pending.lock().as_ref().map_or(0, HashMap::len)
    }

    /// Send `args` as a `query` request and wait for the matching reply.
    pub async fn query(&self, args: &Value) -> AgentResult<Value> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        match self.inner.pending.lock().as_mut() {
            Some(waiters) => {
                waiters.insert(id.clone(), tx);
            }
            None => return Err(AgentError::Closed),
        }

        let mut line = serde_json::to_string(&AgentRequest {
            id: &id,
            kind: "query",
            args,
        })
        .map_err(|e| AgentError::Request(e.to_string()))?;
        line.push('\n');

        if let Err(e) = self.write_line(&line).await {
            self.forget(&id);
            return Err(e);
        }

        // A dropped sender means the reader went away without draining us.
        rx.await.unwrap_or(Err(AgentError::Closed))
    }

    async fn write_line(&self, line: &str) -> AgentResult<()> {
        let mut stdin = self.inner.stdin.lock().await;
        let Some(stdin) = stdin.as_mut() else {
            return Err(AgentError::Closed);
        };
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))
    }

    fn forget(&self, id: &str) {
        if let Some(waiters) = self.inner.pending.lock().as_mut() {
            waiters.remove(id);
        }
    }

    /// Fail outstanding queries, close stdin and kill the process.
    pub async fn close(&self) {
        let failed = fail_pending(&self.inner.pending);
        if failed > 0 {
            debug!(command = %self.inner.command, failed, "Failed outstanding agent queries on close");
        }

        self.inner.stdin.lock().await.take();

        let child = self.inner.child.lock().take();
        if let Some(mut child) = child
            && let Err(e) = child.start_kill()
        {
            debug!(command = %self.inner.command, "Agent process already gone: {}", e);
        }
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

async fn read_replies(stdout: ChildStdout, pending: PendingQueries, command: String) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch_reply(&line, &pending),
            Ok(None) => break,
            Err(e) => {
                warn!(command = %command, "Failed to read agent output: {}", e);
                break;
            }
        }
    }

    let failed = fail_pending(&pending);
    info!(command = %command, failed, "Agent process closed");
}

/// Route one stdout line to the query waiting on its id.
///
/// Lines that are not JSON, lack a string `id`, or name an unknown id are dropped.
fn dispatch_reply(line: &str, pending: &Mutex<Option<Waiters>>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let reply: AgentReply = match serde_json::from_str(line) {
        Ok(reply) => reply,
        Err(e) => {
            debug!("Ignoring malformed agent line ({}): {}", e, line);
            return;
        }
    };

    let waiter = pending
        .lock()
        .as_mut()
        .and_then(|waiters| waiters.remove(&reply.id));
    let Some(waiter) = waiter else {
        debug!(id = %reply.id, "Ignoring agent reply with no matching query");
        return;
    };

    let outcome = match reply.error {
        Some(error) if is_truthy(&error) => Err(AgentError::Remote(error_message(&error))),
        _ => Ok(reply.result.unwrap_or(Value::Null)),
    };
    let _ = waiter.send(outcome);
}

fn fail_pending(pending: &Mutex<Option<Waiters>>) -> usize {
    let Some(waiters) = pending.lock().take() else {
        return 0;
    };
    let count = waiters.len();
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(AgentError::Closed));
    }
    count
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
