//! Events emitted by a voice session to the UI layer.
//!
//! A single tagged union replaces per-event callbacks: the orchestrator hands
//! out an `mpsc::UnboundedReceiver<SessionEvent>` and the UI matches on it.
//!
//! # Wire Format
//!
//! Events serialize with a `type` tag so they can be forwarded to a frontend
//! verbatim:
//!
//! ```json
//! { "type": "text", "text": "Hello" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;
use crate::protocol::FunctionCall;
use crate::state::ConnectionState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Connection state changed.
    StateChanged { state: ConnectionState },

    /// Gateway accepted the socket.
    Connected,

    /// Session negotiated; recording and messages are accepted.
    SessionStarted,

    /// Upstream model setup finished.
    SetupComplete,

    /// Model text delta.
    Text { text: String },

    /// User speech transcription delta.
    InputTranscription { text: String },

    /// Model speech transcription delta.
    OutputTranscription { text: String },

    /// The model finished a turn.
    TurnComplete,

    /// Barge-in: playback has already been stopped when this is delivered.
    Interrupted,

    /// The model requested tool execution.
    ToolCall { calls: Vec<FunctionCall> },

    /// The gateway ended the session; the socket remains open.
    SessionEnded { reason: Option<String> },

    /// Model audio started playing (queue went idle → active).
    PlaybackStarted,

    /// Model audio stopped (queue drained or was interrupted).
    PlaybackFinished,

    /// Microphone capture started.
    RecordingStarted,

    /// Microphone capture stopped.
    RecordingStopped,

    /// A failure the UI should surface.
    Error(ErrorInfo),

    /// The socket closed. Fired once per connection.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn text_event_wire_shape() {
        let value = serde_json::to_value(SessionEvent::Text {
            text: "Hello".into(),
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "text", "text": "Hello" }));
    }

    #[test]
    fn error_event_flattens_info() {
        let value = serde_json::to_value(SessionEvent::Error(ErrorInfo::new(
            ErrorCode::RecordingError,
            "no microphone",
        )))
        .unwrap();
        assert_eq!(
            value,
            json!({ "type": "error", "code": "RECORDING_ERROR", "message": "no microphone" })
        );
    }

    #[test]
    fn state_change_uses_snake_case_state() {
        let value = serde_json::to_value(SessionEvent::StateChanged {
            state: ConnectionState::SetupPending,
        })
        .unwrap();
        assert_eq!(value, json!({ "type": "state_changed", "state": "setup_pending" }));
    }
}
