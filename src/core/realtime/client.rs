//! OpenAI Realtime WebSocket connection.
//!
//! [`connect`] performs the handshake and spawns a task that owns the socket.
//! The caller gets a [`RealtimeHandle`] for sending [`ClientEvent`]s and a
//! receiver of [`RealtimeEvent`]s. Incoming frames are parsed as JSON and
//! forwarded untouched; frames that are not JSON are dropped with a warning.
//! The receiver always ends with exactly one [`RealtimeEvent::Closed`].

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::RealtimeConfig;
use super::messages::ClientEvent;
use super::{RealtimeError, RealtimeResult};

/// Channel capacity for events delivered to the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something that happened on the realtime connection.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// A parsed server event
    Message(Value),
    /// The connection ended. `reason` is `None` when it was closed locally.
    Closed { reason: Option<String> },
}

/// Sending half of a realtime connection.
///
/// Sends never wait on the network: events are queued to the socket task.
#[derive(Debug, Clone)]
pub struct RealtimeHandle {
    outgoing: mpsc::UnboundedSender<ClientEvent>,
    shutdown: CancellationToken,
}

impl RealtimeHandle {
    /// Build a handle around an arbitrary event sink (used by tests and the simulator).
    pub fn from_parts(
        outgoing: mpsc::UnboundedSender<ClientEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { outgoing, shutdown }
    }

    pub fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(RealtimeError::NotConnected);
        }
        self.outgoing
            .send(event)
            .map_err(|_| RealtimeError::NotConnected)
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.outgoing.is_closed()
    }

    /// Close the socket. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

/// Open a realtime connection.
pub async fn connect(
    config: &RealtimeConfig,
) -> RealtimeResult<(RealtimeHandle, mpsc::Receiver<RealtimeEvent>)> {
    if config.api_key.is_empty() {
        return Err(RealtimeError::AuthenticationFailed(
            "API key is required".to_string(),
        ));
    }

    let url = config.ws_url();
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
    let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
        .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
    request.headers_mut().insert("Authorization", auth);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

    info!(model = %config.model, "Connected to OpenAI Realtime API");

    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let shutdown = CancellationToken::new();

    tokio::spawn(run_connection(
        ws_stream,
        outgoing_rx,
        event_tx,
        shutdown.clone(),
    ));

    Ok((RealtimeHandle::from_parts(outgoing_tx, shutdown), event_rx))
}

async fn run_connection(
    ws_stream: WsStream,
    mut outgoing: mpsc::UnboundedReceiver<ClientEvent>,
    events: mpsc::Sender<RealtimeEvent>,
    shutdown: CancellationToken,
) {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Closing OpenAI Realtime connection");
                let _ = ws_sink.send(Message::Close(None)).await;
                break None;
            }

            Some(event) = outgoing.recv() => {
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize {}: {}", event.event_type(), e);
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break Some(format!("send failed: {e}"));
                }
            }

            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Value>(&text) {
                            Ok(value) => {
                                if events.send(RealtimeEvent::Message(value)).await.is_err() {
                                    debug!("Realtime event receiver dropped");
                                    break None;
                                }
                            }
                            Err(e) => {
                                warn!("Discarding malformed realtime frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("WebSocket closed by server");
                        break Some(
                            frame
                                .map(|f| format!("closed by server ({}): {}", f.code, f.reason.as_str()))
                                .unwrap_or_else(|| "closed by server".to_string()),
                        );
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            error!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break Some(e.to_string());
                    }
                    None => break Some("stream ended".to_string()),
                }
            }
        }
    };

    shutdown.cancel();
    let _ = events.send(RealtimeEvent::Closed { reason }).await;
}
