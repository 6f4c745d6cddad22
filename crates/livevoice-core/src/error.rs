//! Structured error codes surfaced to UI code.
//!
//! Component-local failures (malformed envelopes, undecodable fragments) are
//! logged and swallowed by the component that hit them. Only failures that
//! make continued operation meaningless reach the caller, as a
//! [`SessionError`] return value and as an [`ErrorInfo`] event.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayError;

/// Fixed error codes, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Opening the gateway connection failed.
    ConnectionError,
    /// Microphone acquisition or capture failed.
    RecordingError,
    /// The gateway sent an `error` envelope.
    ServerError,
    /// The socket failed while open.
    TransportError,
}

impl ErrorCode {
    /// Wire label, e.g. `"RECORDING_ERROR"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::RecordingError => "RECORDING_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ code, message }` pair delivered with `SessionEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Errors returned by the session orchestrator's public operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The gateway URL could not be derived.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Recording could not start.
    #[error("Recording failed: {0}")]
    Recording(String),

    /// No live connection.
    #[error("Not connected")]
    NotConnected,

    /// Voice is negotiated at session setup and cannot change mid-session.
    #[error("Voice cannot change while connected (current: {current})")]
    VoiceLocked { current: String },
}

impl SessionError {
    /// Structured code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Connection(_) | Self::Gateway(_) | Self::NotConnected | Self::VoiceLocked { .. } => {
                ErrorCode::ConnectionError
            }
            Self::Recording(_) => ErrorCode::RecordingError,
        }
    }

    /// Convert into the `{ code, message }` event payload.
    #[must_use]
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_as_wire_labels() {
        let json = serde_json::to_string(&ErrorCode::RecordingError).unwrap();
        assert_eq!(json, "\"RECORDING_ERROR\"");
        assert_eq!(ErrorCode::ConnectionError.to_string(), "CONNECTION_ERROR");
    }

    #[test]
    fn recording_error_maps_to_recording_code() {
        let err = SessionError::Recording("Microphone permission denied".into());
        let info = err.to_info();
        assert_eq!(info.code, ErrorCode::RecordingError);
        assert_eq!(info.message, "Recording failed: Microphone permission denied");
    }

    #[test]
    fn voice_locked_names_current_voice() {
        let err = SessionError::VoiceLocked {
            current: "Puck".into(),
        };
        assert!(err.to_string().contains("Puck"));
    }
}
