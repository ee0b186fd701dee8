//! Per-call session actor.
//!
//! One [`CallSession`] owns all state of a phone call and is the only place
//! it is mutated. It reads three sources in a single loop:
//!
//! - Twilio media-stream frames ([`TelephonyEvent`])
//! - OpenAI Realtime events ([`RealtimeEvent`])
//! - completions of tool calls running in background tasks
//!
//! Outgoing traffic goes through unbounded queues owned by the socket tasks,
//! so handling an event never waits on the network.
//!
//! # Barge-in
//!
//! When the realtime server reports `input_audio_buffer.speech_started` the
//! session clears Twilio's playback buffer, cancels the in-flight response
//! and truncates the assistant item to the audio the caller actually heard
//! (wall-clock time since its first delta).

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::logger::{CallLogger, CallMeta, LogSource, timestamp};
use super::queue::BoundedQueue;
use super::tools::{self, CallContext, ToolOutput};
use crate::core::agent::AgentClient;
use crate::core::realtime::{
    ClientEvent, RealtimeEvent, RealtimeHandle, ServerEvent, SessionSettings,
};
use crate::core::telephony::{TwilioInbound, TwilioOutbound};

/// Something that happened on the Twilio socket.
#[derive(Debug, Clone)]
pub enum TelephonyEvent {
    /// A text frame
    Message(String),
    /// The socket closed
    Closed,
}

/// Instructions for the task that owns the Twilio socket.
#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyCommand {
    Send(TwilioOutbound),
    Close,
}

/// Assistant output currently being played to the caller.
#[derive(Debug, Clone)]
struct AssistantItem {
    id: String,
    started_at: Option<Instant>,
}

/// One phone call bridged to one realtime session.
///
/// Owns both sides of the call. [`run`](Self::run) consumes the session and
/// returns once either side has gone away, after closing the realtime
/// connection, the agent, the Twilio socket and the call log.
pub struct CallSession {
    id: String,
    settings: SessionSettings,
    realtime: RealtimeHandle,
    telephony: mpsc::UnboundedSender<TelephonyCommand>,
    agent: Option<AgentClient>,
    logger: CallLogger,

    started_at: String,
    stream_sid: Option<String>,
    call_sid: Option<String>,
    session_ready: bool,
    greeting_sent: bool,
    response_in_flight: bool,
    inbound_audio: BoundedQueue<String>,
    outbound_audio: BoundedQueue<String>,
    assistant_item: Option<AssistantItem>,
    pending_tool_calls: HashSet<String>,
    tool_tx: mpsc::UnboundedSender<ToolOutput>,
    tool_rx: Option<mpsc::UnboundedReceiver<ToolOutput>>,
    closing: bool,
}

impl CallSession {
    pub fn new(
        settings: SessionSettings,
        realtime: RealtimeHandle,
        telephony: mpsc::UnboundedSender<TelephonyCommand>,
        agent: Option<AgentClient>,
        logger: CallLogger,
        audio_queue_capacity: usize,
    ) -> Self {
        let (tool_tx, tool_rx) = mpsc::unbounded_channel();
        let session = Self {
            id: logger.id().to_string(),
            settings,
            realtime,
            telephony,
            agent,
            logger,
            started_at: timestamp(),
            stream_sid: None,
            call_sid: None,
            session_ready: false,
            greeting_sent: false,
            response_in_flight: false,
            inbound_audio: BoundedQueue::new(audio_queue_capacity),
            outbound_audio: BoundedQueue::new(audio_queue_capacity),
            assistant_item: None,
            pending_tool_calls: HashSet::new(),
            tool_tx,
            tool_rx: Some(tool_rx),
            closing: false,
        };

        session.log_vox(json!({ "type": "twilio.ws.connected" }));
        session.write_meta();
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive the call until either side closes, then release everything.
    pub async fn run(
        mut self,
        mut telephony_rx: mpsc::Receiver<TelephonyEvent>,
        mut realtime_rx: mpsc::Receiver<RealtimeEvent>,
    ) {
        let Some(mut tool_rx) = self.tool_rx.take() else {
            return;
        };
        info!(call_id = %self.id, "Call session started");

        while !self.closing {
            tokio::select! {
                event = telephony_rx.recv() => match event {
                    Some(TelephonyEvent::Message(text)) => self.handle_telephony_text(&text),
                    Some(TelephonyEvent::Closed) | None => {
                        self.log_vox(json!({ "type": "twilio.ws.closed" }));
                        self.begin_close("telephony socket closed");
                    }
                },

                event = realtime_rx.recv() => match event {
                    Some(RealtimeEvent::Message(value)) => self.handle_realtime_event(value),
                    Some(RealtimeEvent::Closed { reason }) => {
                        let reason = reason.unwrap_or_else(|| "closed".to_string());
                        self.log_vox(json!({ "type": "openai.closed", "reason": reason }));
                        self.begin_close("realtime connection closed");
                    }
                    None => self.begin_close("realtime connection dropped"),
                },

                Some(output) = tool_rx.recv() => self.handle_tool_output(output),
            }
        }

        self.shutdown().await;
    }

    // =========================================================================
    // Twilio -> session
    // =========================================================================

    fn handle_telephony_text(&mut self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(call_id = %self.id, "Discarding malformed Twilio frame: {}", e);
                return;
            }
        };
        self.logger.event(LogSource::Twilio, value.clone());

        let message = match TwilioInbound::deserialize(&value) {
            Ok(message) => message,
            Err(e) => {
                warn!(call_id = %self.id, "Discarding unexpected Twilio message: {}", e);
                return;
            }
        };

        match message {
            TwilioInbound::Connected => debug!(call_id = %self.id, "Twilio stream connected"),
            TwilioInbound::Start { stream_sid, start } => {
                self.on_start(start.stream_sid.or(stream_sid), start.call_sid)
            }
            TwilioInbound::Media { media, .. } => self.on_caller_audio(media.payload),
            TwilioInbound::Stop { .. } => {
                self.log_vox(json!({ "type": "twilio.stop" }));
                self.begin_close("twilio stop");
            }
            TwilioInbound::Other => {}
        }
    }

    fn on_start(&mut self, stream_sid: Option<String>, call_sid: Option<String>) {
        self.stream_sid = stream_sid;
        self.call_sid = call_sid;
        info!(
            call_id = %self.id,
            stream_sid = ?self.stream_sid,
            call_sid = ?self.call_sid,
            "Twilio stream started"
        );
        self.log_vox(json!({
            "type": "twilio.start",
            "streamSid": self.stream_sid,
            "callSid": self.call_sid,
        }));
        self.write_meta();

        if let Some(stream_sid) = self.stream_sid.clone() {
            let queued: Vec<String> = self.outbound_audio.drain().collect();
            for payload in queued {
                self.send_telephony(TwilioOutbound::media(stream_sid.as_str(), payload));
            }
        }
    }

    fn on_caller_audio(&mut self, payload: String) {
        let dropped = self.inbound_audio.push(payload);
        if dropped > 0 {
            debug!(call_id = %self.id, dropped, "Caller audio queue full, dropped oldest frames");
        }
        self.flush_inbound_audio();
    }

    fn flush_inbound_audio(&mut self) {
        if !self.session_ready {
            return;
        }
        let queued: Vec<String> = self.inbound_audio.drain().collect();
        for payload in queued {
            self.send_realtime(ClientEvent::audio_append(payload));
        }
    }

    // =========================================================================
    // OpenAI -> session
    // =========================================================================

    fn handle_realtime_event(&mut self, value: Value) {
        let event = ServerEvent::from_value(&value);
        self.logger.event(LogSource::OpenAI, value);

        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(call_id = %self.id, "Discarding malformed realtime event: {}", e);
                return;
            }
        };

        match event {
            ServerEvent::SessionCreated => {
                let tools = tools::tool_definitions();
                self.send_realtime(ClientEvent::session_update(&self.settings, tools));
            }
            ServerEvent::SessionUpdated => self.on_session_ready(),
            ServerEvent::SpeechStarted => self.on_speech_started(),
            ServerEvent::ResponseCreated => self.response_in_flight = true,
            ServerEvent::AudioDelta { delta, item_id } => self.on_assistant_audio(delta, item_id),
            ServerEvent::AudioDone => {
                self.response_in_flight = false;
                self.clear_item_start();
            }
            ServerEvent::ResponseDone { response } => {
                self.response_in_flight = false;
                self.clear_item_start();
                self.dispatch_tools(tools::function_calls(response.as_ref()));
            }
            ServerEvent::Error { error } => {
                let error = error.unwrap_or_default();
                warn!(
                    call_id = %self.id,
                    code = ?error.code,
                    "Realtime error: {}",
                    error.message.as_deref().unwrap_or("unknown")
                );
            }
            ServerEvent::TextDelta { .. } | ServerEvent::TextDone | ServerEvent::Unknown => {}
        }
    }

    fn on_session_ready(&mut self) {
        if !self.session_ready {
            info!(call_id = %self.id, "Realtime session ready");
        }
        self.session_ready = true;
        self.flush_inbound_audio();

        if !self.greeting_sent
            && let Some(greeting) = self.settings.initial_greeting.clone()
        {
            self.greeting_sent = true;
            let modalities = self.settings.output_modalities.clone();
            self.send_realtime(ClientEvent::response_create_with(
                Some(greeting),
                Some(modalities),
            ));
            self.response_in_flight = true;
        }
    }

    fn on_assistant_audio(&mut self, delta: Option<String>, item_id: Option<String>) {
        if let Some(item_id) = item_id {
            let is_new = self
                .assistant_item
                .as_ref()
                .is_none_or(|item| item.id != item_id);
            if is_new {
                self.assistant_item = Some(AssistantItem {
                    id: item_id,
                    started_at: Some(Instant::now()),
                });
            }
        }

        if let Some(delta) = delta.filter(|d| !d.is_empty()) {
            match self.stream_sid.clone() {
                Some(stream_sid) => self.send_telephony(TwilioOutbound::media(stream_sid, delta)),
                None => {
                    self.outbound_audio.push(delta);
                }
            }
        }
        self.response_in_flight = true;
    }

    fn on_speech_started(&mut self) {
        debug!(call_id = %self.id, in_flight = self.response_in_flight, "Caller started speaking");

        if let Some(stream_sid) = self.stream_sid.clone() {
            self.send_telephony(TwilioOutbound::clear(stream_sid));
        }

        if self.response_in_flight {
            self.send_realtime(ClientEvent::ResponseCancel);
        }

        if let Some(AssistantItem {
            id,
            started_at: Some(started_at),
        }) = self.assistant_item.clone()
        {
            let elapsed = Instant::now().saturating_duration_since(started_at);
            let audio_end_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            self.send_realtime(ClientEvent::truncate(id, audio_end_ms));
        }

        self.response_in_flight = false;
    }

    fn clear_item_start(&mut self) {
        if let Some(item) = self.assistant_item.as_mut() {
            item.started_at = None;
        }
    }

    // =========================================================================
    // Tools
    // =========================================================================

    fn dispatch_tools(&mut self, calls: Vec<tools::FunctionCall>) {
        let context = CallContext {
            call_sid: self.call_sid.clone(),
            stream_sid: self.stream_sid.clone(),
        };

        for call in calls {
            if !tools::is_known_tool(&call.name) {
                debug!(call_id = %self.id, tool = %call.name, "Ignoring unknown tool call");
                continue;
            }
            if !self.pending_tool_calls.insert(call.call_id.clone()) {
                debug!(call_id = %self.id, tool_call = %call.call_id, "Tool call already running");
                continue;
            }

            debug!(call_id = %self.id, tool = %call.name, tool_call = %call.call_id, "Running tool");
            let agent = self.agent.clone();
            let log_dir = self.logger.dir().to_path_buf();
            let context = context.clone();
            let tx = self.tool_tx.clone();

            tokio::spawn(async move {
                if let Some(output) = tools::execute(&call, agent.as_ref(), &log_dir, &context).await
                {
                    let _ = tx.send(output);
                }
            });
        }
    }

    fn handle_tool_output(&mut self, output: ToolOutput) {
        self.pending_tool_calls.remove(&output.call_id);

        if let Some(error) = &output.error {
            warn!(call_id = %self.id, tool = %output.name, "Tool failed: {}", error);
            self.log_vox(json!({ "type": "tool.error", "error": error }));
        }

        self.send_realtime(ClientEvent::function_call_output(
            output.call_id,
            &output.output,
        ));
        self.send_realtime(ClientEvent::response_create());
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn send_realtime(&self, event: ClientEvent) {
        if let Err(e) = self.realtime.send(event) {
            debug!(call_id = %self.id, "Dropping realtime event: {}", e);
        }
    }

    fn send_telephony(&self, message: TwilioOutbound) {
        if self.telephony.send(TelephonyCommand::Send(message)).is_err() {
            debug!(call_id = %self.id, "Twilio socket gone, dropping frame");
        }
    }

    fn log_vox(&self, payload: Value) {
        self.logger.event(LogSource::Vox, payload);
    }

    fn write_meta(&self) {
        self.logger.write_meta(CallMeta {
            started_at: self.started_at.clone(),
            call_sid: self.call_sid.clone(),
            stream_sid: self.stream_sid.clone(),
        });
    }

    fn begin_close(&mut self, reason: &str) {
        if !self.closing {
            info!(call_id = %self.id, reason, "Closing call session");
            self.closing = true;
        }
    }

    async fn shutdown(&mut self) {
        self.closing = true;
        self.realtime.close();
        if let Some(agent) = &self.agent {
            agent.close().await;
        }
        let _ = self.telephony.send(TelephonyCommand::Close);
        self.logger.close().await;
        info!(call_id = %self.id, "Call session closed");
    }
}
