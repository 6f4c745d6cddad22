//! In-process voice gateway for socket-level tests.
//!
//! Accepts WebSocket clients on `127.0.0.1` one after another, records every
//! text frame it receives as JSON, and lets the test push frames back to the
//! client currently connected.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

pub const WAIT: Duration = Duration::from_secs(5);

pub struct MockGateway {
    /// `http://127.0.0.1:<port>`, suitable as a gateway base URL.
    pub base_url: String,
    /// `ws://127.0.0.1:<port>/ws`.
    pub ws_url: String,
    received: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl MockGateway {
    /// Start a gateway. With `auto_start`, every `start-session` is answered
    /// with `session-started`.
    pub async fn start(auto_start: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            // Clients are served one at a time; a reconnect lands on the
            // same channels as the connection it replaces.
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(socket) = accept_async(stream).await else {
                    continue;
                };
                if !serve(socket, auto_start, &received_tx, &mut outbound_rx).await {
                    break;
                }
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            ws_url: format!("ws://127.0.0.1:{port}/ws"),
            received,
            outbound,
        }
    }

    /// Push a JSON frame to the client.
    pub fn push(&self, value: Value) {
        self.push_raw(value.to_string());
    }

    /// Push an arbitrary text frame to the client.
    pub fn push_raw(&self, text: impl Into<String>) {
        let text: String = text.into();
        let _ = self.outbound.send(Message::Text(text.into()));
    }

    /// Close the socket from the gateway side.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    /// Next frame received from the client.
    pub async fn next_message(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("gateway task ended")
    }

    /// Next frame whose `event` is `name`, skipping others.
    pub async fn next_event(&mut self, name: &str) -> Value {
        loop {
            let message = self.next_message().await;
            if message["event"] == name {
                return message;
            }
        }
    }

    /// Frames received so far, without waiting.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(value) = self.received.try_recv() {
            out.push(value);
        }
        out
    }
}

/// Serve one client until either side closes. Returns `false` once the test
/// has dropped its `MockGateway`.
async fn serve(
    socket: WebSocketStream<TcpStream>,
    auto_start: bool,
    received_tx: &mpsc::UnboundedSender<Value>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Message>,
) -> bool {
    let (mut tx, mut rx) = socket.split();
    loop {
        tokio::select! {
            frame = rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if auto_start && value["event"] == "start-session" {
                        let reply = json!({ "type": "session-started" }).to_string();
                        let _ = tx.send(Message::Text(reply.into())).await;
                    }
                    let _ = received_tx.send(value);
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => return true,
                Some(Ok(_)) => {}
            },
            command = outbound_rx.recv() => match command {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    let _ = tx.send(message).await;
                    if closing {
                        return true;
                    }
                }
                None => return false,
            },
        }
    }
}

/// A listener that accepts TCP connections but never completes a handshake.
pub async fn silent_listener() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    (format!("ws://127.0.0.1:{port}/ws"), task)
}

/// A URL on which nothing is listening.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{port}/ws")
}

/// Receive from `rx` until `pred` matches, returning everything seen
/// (including the match).
pub async fn collect_until<T: std::fmt::Debug>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    mut pred: impl FnMut(&T) -> bool,
) -> Vec<T> {
    let mut seen = Vec::new();
    loop {
        let item = tokio::time::timeout(WAIT, rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out; saw {seen:?}"))
            .expect("event channel closed");
        let done = pred(&item);
        seen.push(item);
        if done {
            return seen;
        }
    }
}
