//! Minimal subprocess agent for trying out `VOX_AGENT_CMD`.
//!
//! Reads `{"id", "type": "query", "args"}` lines on stdin and answers each
//! with `{"id", "result": {"ok": true, "echo": args, "answer": ...}}`.
//! Anything else is ignored.

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let Some(reply) = reply(&line) else {
            continue;
        };
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    Ok(())
}

fn reply(line: &str) -> Option<Value> {
    let message: Value = serde_json::from_str(line).ok()?;
    if message.get("type").and_then(Value::as_str) != Some("query") {
        return None;
    }
    let id = message.get("id").and_then(Value::as_str)?;
    let args = message.get("args").cloned().unwrap_or(Value::Null);

    let question = args
        .get("question")
        .or_else(|| args.get("args").and_then(|inner| inner.get("question")))
        .and_then(Value::as_str)
        .filter(|q| !q.is_empty());

    let answer = match question {
        Some(question) => format!("Echo agent says: you asked \"{question}\"."),
        None => "Echo agent says: I received your request.".to_string(),
    };

    Some(json!({
        "id": id,
        "result": { "ok": true, "echo": args, "answer": answer }
    }))
}
