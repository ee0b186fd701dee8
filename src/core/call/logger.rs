//! Per-call durable log.
//!
//! Each call gets its own directory `<log_dir>/<call id>/` holding:
//! - `events.jsonl`: one `{t, source, payload}` record per line, append-only
//! - `meta.json`: start time plus the Twilio call/stream ids
//! - `report.json`: written by the `save_call_report` tool, if ever called
//!
//! Writes are queued to a background task so callers never wait on disk.
//! Failures are reported through `tracing` and never end the call.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const EVENTS_FILE: &str = "events.jsonl";
pub const META_FILE: &str = "meta.json";
pub const REPORT_FILE: &str = "report.json";

/// Who produced a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Twilio,
    #[serde(rename = "openai")]
    OpenAI,
    Vox,
}

#[derive(Debug, Serialize)]
struct LogRecord {
    t: String,
    source: LogSource,
    payload: Value,
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMeta {
    pub started_at: String,
    pub call_sid: Option<String>,
    pub stream_sid: Option<String>,
}

#[derive(Debug)]
enum LogCommand {
    Event(LogRecord),
    Meta(CallMeta),
}

/// Current UTC time as RFC 3339.
pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// `<prefix>_<unix millis>_<random hex>`
pub fn new_call_id(prefix: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{millis}_{}", &random[..12])
}

#[derive(Debug)]
pub struct CallLogger {
    id: String,
    dir: PathBuf,
    tx: Option<mpsc::UnboundedSender<LogCommand>>,
    writer: Option<JoinHandle<()>>,
}

impl CallLogger {
    /// Create `<base_dir>/<id>/` and open its events file for appending.
    pub async fn create(base_dir: &Path, id: impl Into<String>) -> std::io::Result<Self> {
        let id = id.into();
        let dir = base_dir.join(&id);
        fs::create_dir_all(&dir).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(EVENTS_FILE))
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(file, dir.clone(), rx));

        debug!(call_id = %id, dir = %dir.display(), "Call log opened");
        Ok(Self {
            id,
            dir,
            tx: Some(tx),
            writer: Some(writer),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory holding this call's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one event record. Ignored after [`close`](Self::close).
    pub fn event(&self, source: LogSource, payload: Value) {
        self.send(LogCommand::Event(LogRecord {
            t: timestamp(),
            source,
            payload,
        }));
    }

    /// (Re)write `meta.json`.
    pub fn write_meta(&self, meta: CallMeta) {
        self.send(LogCommand::Meta(meta));
    }

    fn send(&self, command: LogCommand) {
        if let Some(tx) = &self.tx
            && tx.send(command).is_err()
        {
            warn!(call_id = %self.id, "Call log writer is gone");
        }
    }

    /// Flush everything queued so far and stop the writer. Idempotent.
    pub async fn close(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take()
            && let Err(e) = writer.await
        {
            warn!(call_id = %self.id, "Call log writer failed: {}", e);
        }
    }
}

async fn run_writer(
    mut file: fs::File,
    dir: PathBuf,
    mut rx: mpsc::UnboundedReceiver<LogCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            LogCommand::Event(record) => {
                let mut line = match serde_json::to_vec(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to serialize call log record: {}", e);
                        continue;
                    }
                };
                line.push(b'\n');
                if let Err(e) = file.write_all(&line).await {
                    warn!(dir = %dir.display(), "Failed to append call event: {}", e);
                }
            }
            LogCommand::Meta(meta) => {
                if let Err(e) = write_pretty_json(&dir.join(META_FILE), &meta).await {
                    warn!(dir = %dir.display(), "Failed to write {}: {}", META_FILE, e);
                }
            }
        }
    }

    if let Err(e) = file.flush().await {
        warn!(dir = %dir.display(), "Failed to flush call events: {}", e);
    }
}

/// Serialize `value` as indented JSON and write it to `path`.
pub async fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, body).await
}
