//! WebSocket connection to the voice gateway.
//!
//! A [`ConnectionManager`] owns one socket for its whole life and the single
//! authoritative [`ConnectionState`]. Instances are single-use: once errored
//! or closed, a new instance is needed to reconnect.
//!
//! ## Tasks
//!
//! After the handshake the socket is split in two:
//!
//! * **Reader**: text frames → [`ServerMessage::parse`] → state transitions
//!   and [`ConnectionEvent::Message`]. Malformed or unknown frames are logged
//!   and skipped; the socket stays open.
//! * **Writer**: drains a bounded channel of outbound frames into the socket.
//!   Producers use `try_send`, so the real-time capture callback never
//!   blocks; a full channel drops the frame with a warning.
//!
//! ## Outbound gating
//!
//! | Call | Allowed in |
//! |---|---|
//! | `setup_session` | connected, setup_pending, ready |
//! | `send_audio` / `send_video` / `send_text_message` / `send_tool_response` | connected, ready |
//! | `send_audio_stream_end` | any state with an open socket |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use livevoice_audio::ChunkSink;
use livevoice_core::protocol::{AudioPayload, EmptyPayload, TextPayload, ToolResponsePayload, VideoPayload};
use livevoice_core::{
    ClientMessage, ConnectionOptions, ConnectionState, FunctionResponse, ServerMessage,
    SessionConfig, StateTrigger,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors returned by [`ConnectionManager::connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The instance already errored or was closed.
    #[error("connection is closed; create a new connection to reconnect")]
    Closed,

    /// The handshake did not finish within the connect timeout.
    #[error("timed out after {after:?} connecting to {url}")]
    Timeout { url: String, after: Duration },

    /// The socket could not be opened.
    #[error("failed to connect to {url}: {reason}")]
    Handshake { url: String, reason: String },
}

/// What the connection reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The state machine moved.
    StateChanged(ConnectionState),
    /// A parsed gateway message.
    Message(ServerMessage),
    /// The socket failed after opening.
    TransportError(String),
    /// The connection is gone. Emitted exactly once.
    Disconnected,
}

/// One gateway socket and its state machine.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    options: ConnectionOptions,
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Create an unconnected manager for `url`.
    pub fn new(
        url: impl Into<String>,
        options: ConnectionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            url: url.into(),
            options,
            state: Mutex::new(ConnectionState::Disconnected),
            outbound: Mutex::new(None),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            events,
            closed: AtomicBool::new(false),
        });
        (Self { inner }, events_rx)
    }

    /// Target socket URL.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Open the socket. Resolves once the transport is open.
    ///
    /// A call while connecting or connected is a logged no-op.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let inner = &self.inner;
        {
            let mut state = inner.lock_state();
            let current = *state;
            if inner.closed.load(Ordering::SeqCst) || current == ConnectionState::Error {
                return Err(ConnectionError::Closed);
            }
            if current != ConnectionState::Disconnected {
                tracing::warn!(state = %current, "Connect requested while already connecting or connected");
                return Ok(());
            }
            inner.transition_locked(&mut state, StateTrigger::ConnectRequested);
        }

        let after = inner.options.connect_timeout;
        tracing::info!(url = %inner.url, "Connecting to voice gateway");

        let socket = match tokio::time::timeout(after, connect_async(inner.url.as_str())).await {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => {
                tracing::error!(url = %inner.url, error = %e, "Gateway connection failed");
                inner.transition(StateTrigger::TransportError);
                return Err(ConnectionError::Handshake {
                    url: inner.url.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                tracing::error!(url = %inner.url, ?after, "Gateway connection timed out");
                inner.transition(StateTrigger::TransportError);
                return Err(ConnectionError::Timeout {
                    url: inner.url.clone(),
                    after,
                });
            }
        };

        // Checked under the state lock so a concurrent `disconnect` either
        // sees the socket or makes this call fail.
        let mut state = inner.lock_state();
        if inner.closed.load(Ordering::SeqCst) {
            tracing::debug!("Disconnected during handshake, dropping socket");
            return Err(ConnectionError::Closed);
        }

        let (ws_sender, ws_receiver) = socket.split();
        let (out_tx, out_rx) = mpsc::channel(inner.options.outbound_capacity.max(1));
        *inner.lock_outbound() = Some(out_tx);
        *lock(&inner.writer) = Some(tokio::spawn(write_loop(
            Arc::clone(inner),
            ws_sender,
            out_rx,
        )));
        *lock(&inner.reader) = Some(tokio::spawn(read_loop(Arc::clone(inner), ws_receiver)));

        inner.transition_locked(&mut state, StateTrigger::TransportOpened);
        tracing::info!(url = %inner.url, "Gateway socket open");
        Ok(())
    }

    /// Close the socket. Idempotent, never fails, safe in any state.
    pub fn disconnect(&self) {
        self.inner.shutdown(StateTrigger::Disconnect);
    }

    // ── Outbound ───────────────────────────────────────────────────

    /// Send `start-session`. Ignored unless the socket is open.
    pub fn setup_session(&self, config: &SessionConfig) -> bool {
        let state = self.state();
        if !state.is_open() {
            tracing::warn!(%state, "Cannot set up session without an open socket");
            return false;
        }
        let sent = self
            .inner
            .enqueue(&ClientMessage::StartSession(config.clone()));
        if sent {
            self.inner.transition(StateTrigger::SetupSent);
        }
        sent
    }

    pub fn send_audio(&self, audio: impl Into<String>, mime_type: impl Into<String>) -> bool {
        self.send_when_ready(&ClientMessage::SendAudio(AudioPayload {
            audio: audio.into(),
            mime_type: mime_type.into(),
        }))
    }

    pub fn send_video(&self, video: impl Into<String>, mime_type: impl Into<String>) -> bool {
        self.send_when_ready(&ClientMessage::SendVideo(VideoPayload {
            video: video.into(),
            mime_type: mime_type.into(),
        }))
    }

    pub fn send_text_message(&self, text: impl Into<String>) -> bool {
        self.send_when_ready(&ClientMessage::SendText(TextPayload { text: text.into() }))
    }

    pub fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> bool {
        self.send_when_ready(&ClientMessage::SendToolResponse(ToolResponsePayload {
            function_responses: responses,
        }))
    }

    /// Best-effort `end-audio-stream`; sent whenever the socket is open.
    pub fn send_audio_stream_end(&self) -> bool {
        if !self.state().is_open() {
            return false;
        }
        self.inner
            .enqueue(&ClientMessage::EndAudioStream(EmptyPayload {}))
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.lock_state()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn send_when_ready(&self, message: &ClientMessage) -> bool {
        let state = self.state();
        if !state.is_ready() {
            tracing::debug!(event = message.event_name(), %state, "Session not ready, dropping message");
            return false;
        }
        self.inner.enqueue(message)
    }
}

impl ChunkSink for ConnectionManager {
    fn send_chunk(&self, audio: String, mime_type: &str) {
        self.send_audio(audio, mime_type);
    }

    fn end_of_stream(&self) {
        self.send_audio_stream_end();
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // Reader and writer hold their own `Arc<Inner>`; stop them here so the
        // socket does not outlive its owner.
        self.inner.abort_tasks();
    }
}

// ── Shared state ───────────────────────────────────────────────────

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        lock(&self.state)
    }

    fn lock_outbound(&self) -> MutexGuard<'_, Option<mpsc::Sender<Message>>> {
        lock(&self.outbound)
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    /// Apply `trigger`, announcing the new state if it changed.
    fn transition(&self, trigger: StateTrigger) -> ConnectionState {
        let mut state = self.lock_state();
        self.transition_locked(&mut state, trigger)
    }

    // Emits under the caller's lock so observers see transitions in order.
    fn transition_locked(&self, state: &mut ConnectionState, trigger: StateTrigger) -> ConnectionState {
        let from = *state;
        let next = from.apply(trigger);
        if next != from {
            tracing::debug!(%from, to = %next, ?trigger, "Connection state changed");
            *state = next;
            self.emit(ConnectionEvent::StateChanged(next));
        }
        next
    }

    fn enqueue(&self, message: &ClientMessage) -> bool {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(event = message.event_name(), error = %e, "Failed to encode message");
                return false;
            }
        };

        let outbound = self.lock_outbound();
        let Some(tx) = outbound.as_ref() else {
            tracing::debug!(event = message.event_name(), "No socket, dropping message");
            return false;
        };

        match tx.try_send(Message::Text(json.into())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(event = message.event_name(), "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(event = message.event_name(), "Writer gone, dropping message");
                false
            }
        }
    }

    /// Route one inbound text frame.
    fn dispatch(&self, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("Ignoring unknown gateway message type");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed gateway message");
                return;
            }
        };

        match &message {
            ServerMessage::SessionStarted => {
                self.transition(StateTrigger::SessionStarted);
            }
            ServerMessage::SessionEnded { reason } => {
                tracing::info!(reason = reason.as_deref().unwrap_or(""), "Gateway ended the session");
                self.transition(StateTrigger::SessionEnded);
            }
            ServerMessage::Error { message } => {
                tracing::error!(%message, "Gateway reported an error");
                self.transition(StateTrigger::ServerError);
            }
            other => tracing::debug!(kind = other.type_name(), "Gateway message"),
        }
        self.emit(ConnectionEvent::Message(message));
    }

    fn transport_error(&self, reason: String) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        tracing::error!(url = %self.url, error = %reason, "Gateway transport error");
        self.transition(StateTrigger::TransportError);
        self.emit(ConnectionEvent::TransportError(reason));
    }

    /// Retire the connection exactly once.
    fn shutdown(&self, trigger: StateTrigger) {
        let mut state = self.lock_state();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Dropping the sender lets the writer flush a Close frame and exit.
        self.lock_outbound().take();
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }

        self.transition_locked(&mut state, trigger);
        drop(state);
        tracing::info!(url = %self.url, "Gateway connection closed");
        self.emit(ConnectionEvent::Disconnected);
    }

    fn abort_tasks(&self) {
        for slot in [&self.reader, &self.writer] {
            if let Some(task) = lock(slot).take() {
                task.abort();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Socket tasks ───────────────────────────────────────────────────

async fn write_loop(
    inner: Arc<Inner>,
    mut ws_sender: SplitSink<Socket, Message>,
    mut out_rx: mpsc::Receiver<Message>,
) {
    while let Some(frame) = out_rx.recv().await {
        if let Err(e) = ws_sender.send(frame).await {
            inner.transport_error(e.to_string());
            return;
        }
    }
    // Sender dropped by disconnect: best-effort close handshake.
    let _ = ws_sender.send(Message::Close(None)).await;
    let _ = ws_sender.close().await;
}

async fn read_loop(inner: Arc<Inner>, mut ws_receiver: SplitStream<Socket>) {
    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => inner.dispatch(&text),
            Ok(Message::Binary(data)) => {
                tracing::debug!(bytes = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Gateway closed the socket");
                break;
            }
            // Ping/pong are answered by tungstenite.
            Ok(_) => {}
            Err(e) => {
                inner.transport_error(e.to_string());
                break;
            }
        }
    }
    inner.shutdown(StateTrigger::TransportClosed);
}
