//! Twilio Media Streams WebSocket handler
//!
//! Twilio opens this socket after fetching the TwiML from `/twiml`. Each
//! connection becomes one call: a [`CallSession`] bridging the socket to a
//! fresh OpenAI Realtime connection.
//!
//! The socket is split in two tasks:
//! - a reader forwarding text frames to the session as [`TelephonyEvent`]s
//! - a writer draining [`TelephonyCommand`]s produced by the session

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::agent::AgentClient;
use crate::core::call::{
    CallLogger, CallSession, LogSource, TelephonyCommand, TelephonyEvent, new_call_id,
};
use crate::core::realtime::{self, RealtimeConfig, SessionSettings};
use crate::state::AppState;

/// Buffer between the socket reader and the session.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket message size (1 MB). Media frames are ~200 bytes.
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Media stream WebSocket handler
///
/// Upgrades the HTTP connection and runs one call session on it.
pub async fn twilio_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Twilio media stream upgrade requested");

    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_twilio_socket(socket, state))
}

async fn handle_twilio_socket(socket: WebSocket, state: Arc<AppState>) {
    let config = &state.config;
    let (sender, receiver) = socket.split();

    let (command_tx, command_rx) = mpsc::unbounded_channel::<TelephonyCommand>();
    let sender_task = tokio::spawn(write_frames(sender, command_rx));

    let (event_tx, event_rx) = mpsc::channel::<TelephonyEvent>(CHANNEL_BUFFER_SIZE);
    let reader_task = tokio::spawn(read_frames(receiver, event_tx));

    let call_id = new_call_id("call");
    let mut logger = match CallLogger::create(&config.log_dir, call_id.as_str()).await {
        Ok(logger) => logger,
        Err(e) => {
            error!(call_id = %call_id, "Failed to open call log: {}", e);
            let _ = command_tx.send(TelephonyCommand::Close);
            reader_task.abort();
            let _ = sender_task.await;
            return;
        }
    };

    let agent = match AgentClient::from_config(config) {
        Ok(agent) => agent,
        Err(e) => {
            warn!(call_id = %call_id, "Agent unavailable for this call: {}", e);
            logger.event(
                LogSource::Vox,
                json!({ "type": "agent.error", "error": e.to_string() }),
            );
            None
        }
    };

    let (realtime, realtime_rx) = match realtime::connect(&RealtimeConfig::from(config)).await {
        Ok(connection) => connection,
        Err(e) => {
            error!(call_id = %call_id, "Failed to connect to OpenAI Realtime: {}", e);
            logger.event(
                LogSource::Vox,
                json!({ "type": "openai.error", "error": e.to_string() }),
            );
            if let Some(agent) = &agent {
                agent.close().await;
            }
            let _ = command_tx.send(TelephonyCommand::Close);
            logger.close().await;
            reader_task.abort();
            let _ = sender_task.await;
            return;
        }
    };

    let session = CallSession::new(
        SessionSettings::from(config),
        realtime,
        command_tx,
        agent,
        logger,
        config.audio_queue_capacity,
    );
    info!(call_id = %session.id(), "Call accepted");

    session.run(event_rx, realtime_rx).await;

    reader_task.abort();
    if let Err(e) = sender_task.await {
        debug!(call_id = %call_id, "Twilio writer ended abnormally: {}", e);
    }
    info!(call_id = %call_id, "Twilio media stream terminated");
}

async fn read_frames(mut receiver: SplitStream<WebSocket>, events: mpsc::Sender<TelephonyEvent>) {
    while let Some(frame) = receiver.next().await {
        let event = match frame {
            Ok(Message::Text(text)) => TelephonyEvent::Message(text.as_str().to_owned()),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Twilio WebSocket error: {}", e);
                break;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    let _ = events.send(TelephonyEvent::Closed).await;
}

async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut commands: mpsc::UnboundedReceiver<TelephonyCommand>,
) {
    while let Some(command) = commands.recv().await {
        let result = match command {
            TelephonyCommand::Send(message) => match serde_json::to_string(&message) {
                Ok(json) => sender.send(Message::Text(json.into())).await,
                Err(e) => {
                    error!("Failed to serialize Twilio message: {}", e);
                    continue;
                }
            },
            TelephonyCommand::Close => {
                debug!("Closing Twilio WebSocket");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = result {
            debug!("Failed to send Twilio frame: {}", e);
            break;
        }
    }
}
