//! WebSocket Mock Server for the OpenAI Realtime API
//!
//! Accepts a single connection. Every text frame the client sends is parsed
//! and handed to the test through `received`; every value pushed into
//! `outgoing` is sent to the client as a text frame. `received` yields `None`
//! once the client has closed the connection.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub struct RealtimeMock {
    pub url: String,
    pub received: mpsc::UnboundedReceiver<Value>,
    pub outgoing: mpsc::UnboundedSender<Value>,
}

impl RealtimeMock {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                assert!(req.headers().contains_key("Authorization"));
                Ok(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                let _ = received_tx.send(value);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    Some(value) = outgoing_rx.recv() => {
                        if write.send(Message::Text(value.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            received,
            outgoing,
        }
    }

    /// Push a server event to the client.
    pub fn send(&self, event: Value) {
        self.outgoing.send(event).unwrap();
    }

    /// Wait for the next client event of the given type, skipping others.
    pub async fn expect(&mut self, event_type: &str) -> Value {
        let wait = async {
            loop {
                match self.received.recv().await {
                    Some(event) if event["type"] == event_type => return event,
                    Some(_) => continue,
                    None => panic!("connection closed while waiting for {event_type}"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
    }

    /// Wait for the client to close the connection.
    pub async fn expect_closed(&mut self) {
        let wait = async { while self.received.recv().await.is_some() {} };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("realtime connection was not closed");
    }
}
