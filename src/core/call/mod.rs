//! Call orchestration: the per-call session actor and what it needs.

mod logger;
mod queue;
mod session;
pub mod tools;

pub use logger::{
    CallLogger, CallMeta, EVENTS_FILE, LogSource, META_FILE, REPORT_FILE, new_call_id, timestamp,
    write_pretty_json,
};
pub use queue::BoundedQueue;
pub use session::{CallSession, TelephonyCommand, TelephonyEvent};
pub use tools::{CallContext, FunctionCall, ToolOutput};
