//! Voice session orchestrator.
//!
//! [`VoiceSession`] is the façade a UI drives. It owns, for one session:
//!
//! - at most one live [`ConnectionManager`] (a fresh one per `connect`),
//! - the [`CapturePipeline`] streaming microphone chunks into it,
//! - the [`PlaybackQueue`] playing the model's audio,
//! - the running [`Transcript`].
//!
//! Gateway events are consumed by a pump task and re-emitted as
//! [`SessionEvent`]s on the receiver returned by [`VoiceSession::new`].
//!
//! ```text
//!  ConnectionEvent ──► pump ──┬─► Transcript (text / transcriptions)
//!                             ├─► PlaybackQueue (audio, interrupt)
//!                             └─► SessionEvent channel ──► UI
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use livevoice_audio::{
    AudioInput, AudioOutput, CapturePipeline, ChunkSink, EchoGate, PlaybackItem, PlaybackQueue,
};
use livevoice_core::config::DEFAULT_VOICE;
use livevoice_core::{
    ClientSettings, ConnectionState, ErrorCode, ErrorInfo, FunctionResponse, ServerMessage,
    SessionConfig, SessionError, SessionEvent, Transcript,
};
use tokio::sync::mpsc;

use crate::connection::{ConnectionEvent, ConnectionManager};

/// The connection currently owned by the session.
struct Held {
    manager: Arc<ConnectionManager>,
    generation: u64,
}

struct SessionInner {
    settings: ClientSettings,
    voice: Mutex<String>,
    connection: Mutex<Option<Held>>,
    /// Bumped on every `connect`; events from older connections are ignored.
    generation: AtomicU64,
    transcript: Mutex<Transcript>,
    capture: CapturePipeline,
    playback: PlaybackQueue,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// One live voice conversation with the gateway.
pub struct VoiceSession {
    inner: Arc<SessionInner>,
}

impl VoiceSession {
    /// Build an idle session over the given audio ports.
    pub fn new(
        settings: ClientSettings,
        input: Arc<dyn AudioInput>,
        output: Arc<dyn AudioOutput>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let gate = EchoGate::new();
        let voice = settings
            .session
            .voice
            .clone()
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());

        let inner = Arc::new(SessionInner {
            capture: CapturePipeline::new(input, settings.capture, gate.clone()),
            playback: PlaybackQueue::new(output, gate, events.clone()),
            settings,
            voice: Mutex::new(voice),
            connection: Mutex::new(None),
            generation: AtomicU64::new(0),
            transcript: Mutex::new(Transcript::default()),
            events,
        });
        (Self { inner }, events_rx)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Open a gateway connection and negotiate the session.
    ///
    /// Refused (warning, `Ok`) while a live connection is held.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let inner = &self.inner;

        let url = inner
            .settings
            .gateway
            .ws_url()
            .map_err(|e| inner.fail(SessionError::from(e)))?;

        if let Err(e) = inner.playback.init() {
            return Err(inner.fail(SessionError::Connection(format!(
                "playback init failed: {e}"
            ))));
        }

        let (manager, generation, stale) = {
            let mut held = lock(&inner.connection);
            if let Some(current) = held.as_ref() {
                if is_live(current.manager.state()) {
                    tracing::warn!(state = %current.manager.state(), "Already connected, ignoring connect");
                    return Ok(());
                }
            }

            let (manager, conn_events) = ConnectionManager::new(url, inner.settings.connection);
            let manager = Arc::new(manager);
            let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(pump(Arc::downgrade(inner), conn_events, generation));

            let stale = held.replace(Held {
                manager: Arc::clone(&manager),
                generation,
            });
            (manager, generation, stale)
        };
        if let Some(stale) = stale {
            tracing::debug!(state = %stale.manager.state(), "Releasing errored connection");
            // Capture still feeds the old manager; the next start_recording
            // must wire it to the new one.
            inner.stop_media(Some(&stale.manager));
            stale.manager.disconnect();
        }

        lock(&inner.transcript).reset();

        if let Err(e) = manager.connect().await {
            inner.release(generation);
            return Err(inner.fail(SessionError::Connection(e.to_string())));
        }

        inner.negotiate(&manager, generation, self.current_voice())
    }

    /// Stop recording and playback, then close the connection. Idempotent.
    pub fn disconnect(&self) {
        let held = lock(&self.inner.connection).take();
        self.inner.stop_media(held.as_ref().map(|h| h.manager.as_ref()));
        if let Some(held) = held {
            held.manager.disconnect();
            tracing::info!("Voice session disconnected");
        }
    }

    // ── Recording ──────────────────────────────────────────────────

    /// Start streaming the microphone. Requires a ready connection.
    pub fn start_recording(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let Some(manager) = inner.manager().filter(|m| m.is_ready()) else {
            tracing::warn!("Cannot start recording: session is not ready");
            return Ok(());
        };
        if inner.capture.is_recording() {
            return Ok(());
        }

        lock(&inner.transcript).reset();

        let sink: Arc<dyn ChunkSink> = manager;
        if let Err(e) = inner.capture.start(sink) {
            return Err(inner.fail(SessionError::Recording(e.to_string())));
        }
        inner.emit(SessionEvent::RecordingStarted);
        Ok(())
    }

    /// Stop streaming the microphone. Idempotent.
    pub fn stop_recording(&self) {
        let manager = self.inner.manager();
        self.inner.stop_capture(manager.as_deref());
    }

    // ── Messaging ──────────────────────────────────────────────────

    /// Send a typed user message.
    pub fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let manager = self.inner.manager().ok_or(SessionError::NotConnected)?;
        lock(&self.inner.transcript).reset();
        manager.send_text_message(text);
        Ok(())
    }

    /// Answer a `tool-call` from the model.
    pub fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<(), SessionError> {
        let manager = self.inner.manager().ok_or(SessionError::NotConnected)?;
        manager.send_tool_response(responses);
        Ok(())
    }

    /// Change the voice used by the next `connect`.
    ///
    /// Rejected while connected: the voice is fixed at session setup.
    pub fn set_voice(&self, voice: impl Into<String>) -> Result<(), SessionError> {
        if self.inner.manager().is_some_and(|m| is_live(m.state())) {
            return Err(SessionError::VoiceLocked {
                current: self.current_voice(),
            });
        }
        let voice = voice.into();
        tracing::info!(%voice, "Voice changed");
        *lock(&self.inner.voice) = voice;
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner
            .manager()
            .map_or(ConnectionState::Disconnected, |m| m.state())
    }

    /// Whether outbound audio and text currently reach the gateway.
    pub fn is_connected(&self) -> bool {
        self.state().is_ready()
    }

    pub fn is_recording(&self) -> bool {
        self.inner.capture.is_recording()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playback.is_playing()
    }

    pub fn playback_pending(&self) -> usize {
        self.inner.playback.pending_len()
    }

    pub fn transcript(&self) -> Transcript {
        lock(&self.inner.transcript).clone()
    }

    pub fn current_voice(&self) -> String {
        lock(&self.inner.voice).clone()
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.disconnect();
        self.inner.playback.dispose();
    }
}

// ── Internals ──────────────────────────────────────────────────────

/// A connection that still counts as "connected" for connect/voice gating.
const fn is_live(state: ConnectionState) -> bool {
    !matches!(state, ConnectionState::Disconnected | ConnectionState::Error)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chunk sink used when capture stops with no connection left.
struct Discard;

impl ChunkSink for Discard {
    fn send_chunk(&self, _audio: String, _mime_type: &str) {}
    fn end_of_stream(&self) {}
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Log, announce, and hand back `err`.
    fn fail(&self, err: SessionError) -> SessionError {
        tracing::error!(code = %err.code(), error = %err, "Voice session error");
        self.emit(SessionEvent::Error(err.to_info()));
        err
    }

    fn manager(&self) -> Option<Arc<ConnectionManager>> {
        lock(&self.connection)
            .as_ref()
            .map(|held| Arc::clone(&held.manager))
    }

    /// Drop the held connection if it is still `generation`.
    fn release(&self, generation: u64) -> Option<Held> {
        let mut held = lock(&self.connection);
        if held.as_ref().is_some_and(|h| h.generation == generation) {
            held.take()
        } else {
            None
        }
    }

    fn stop_capture(&self, manager: Option<&ConnectionManager>) {
        let sink: &dyn ChunkSink = match manager {
            Some(manager) => manager,
            None => &Discard,
        };
        if self.capture.stop(sink) {
            self.emit(SessionEvent::RecordingStopped);
        }
    }

    /// Send session setup on a freshly opened socket.
    ///
    /// When the socket dropped before setup could be queued, the connection
    /// is released and the failure reported as a connection error.
    fn negotiate(
        &self,
        manager: &ConnectionManager,
        generation: u64,
        voice: String,
    ) -> Result<(), SessionError> {
        let config = SessionConfig {
            voice: Some(voice),
            ..self.settings.session.clone()
        };
        if !manager.setup_session(&config) {
            self.release(generation);
            manager.disconnect();
            return Err(self.fail(SessionError::Connection(
                "session setup could not be sent".to_string(),
            )));
        }
        tracing::info!(url = %manager.url(), voice = config.voice.as_deref().unwrap_or(""), "Voice session connecting");
        Ok(())
    }

    fn stop_media(&self, manager: Option<&ConnectionManager>) {
        self.stop_capture(manager);
        self.playback.stop();
    }

    fn handle(&self, event: ConnectionEvent, generation: u64) {
        if generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(generation, "Ignoring event from a replaced connection");
            return;
        }

        match event {
            ConnectionEvent::StateChanged(state) => self.emit(SessionEvent::StateChanged { state }),
            ConnectionEvent::Message(message) => self.handle_message(message),
            ConnectionEvent::TransportError(reason) => {
                self.emit(SessionEvent::Error(ErrorInfo::new(ErrorCode::TransportError, reason)));
            }
            ConnectionEvent::Disconnected => {
                let held = self.release(generation);
                self.stop_media(held.as_ref().map(|h| h.manager.as_ref()));
                self.emit(SessionEvent::Disconnected);
            }
        }
    }

    fn handle_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::Connected => self.emit(SessionEvent::Connected),
            ServerMessage::SessionStarted => {
                tracing::info!("Voice session ready");
                self.emit(SessionEvent::SessionStarted);
            }
            ServerMessage::SetupComplete => self.emit(SessionEvent::SetupComplete),
            ServerMessage::AudioResponse { audio, mime_type } => {
                self.playback.queue_audio(PlaybackItem::new(audio, mime_type));
            }
            ServerMessage::TextResponse { text } => {
                lock(&self.transcript).append_output(&text);
                self.emit(SessionEvent::Text { text });
            }
            ServerMessage::InputTranscription { text } => {
                lock(&self.transcript).append_input(&text);
                self.emit(SessionEvent::InputTranscription { text });
            }
            ServerMessage::OutputTranscription { text } => {
                lock(&self.transcript).append_output(&text);
                self.emit(SessionEvent::OutputTranscription { text });
            }
            ServerMessage::TurnComplete => self.emit(SessionEvent::TurnComplete),
            ServerMessage::Interrupted => {
                // Stale model audio must be silenced before anyone observes
                // the interruption.
                self.playback.stop();
                self.emit(SessionEvent::Interrupted);
            }
            ServerMessage::SessionEnded { reason } => self.emit(SessionEvent::SessionEnded { reason }),
            ServerMessage::Error { message } => {
                self.emit(SessionEvent::Error(ErrorInfo::new(ErrorCode::ServerError, message)));
            }
            ServerMessage::ToolCall { calls } => {
                tracing::info!(count = calls.len(), "Model requested tool calls");
                self.emit(SessionEvent::ToolCall { calls });
            }
        }
    }
}

async fn pump(
    session: Weak<SessionInner>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    generation: u64,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.handle(event, generation);
    }
}
