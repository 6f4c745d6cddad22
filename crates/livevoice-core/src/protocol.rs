//! Wire protocol between the client and the voice gateway.
//!
//! Every message is a JSON envelope sent as a WebSocket text frame:
//!
//! | Direction | Shape |
//! |---|---|
//! | Client → Gateway | `{ "event": "<name>", "data": { ... } }` |
//! | Gateway → Client | `{ "type": "<name>", "data"?: { ... } }` |
//!
//! Outbound envelopes are a serde-tagged enum ([`ClientMessage`]). Inbound
//! envelopes are parsed in two steps so that unknown `type`s can be ignored
//! instead of failing: the envelope is read as `{ type, data }` first, then
//! `data` is decoded for the known types only.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::SessionConfig;

// ── Outbound ───────────────────────────────────────────────────────

/// Messages sent from the client to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Negotiate a session (model, voice, instructions).
    StartSession(SessionConfig),

    /// One base64 PCM chunk from the microphone.
    SendAudio(AudioPayload),

    /// One base64 video/image frame.
    SendVideo(VideoPayload),

    /// A typed user message.
    SendText(TextPayload),

    /// Results for tool calls requested by the model.
    SendToolResponse(ToolResponsePayload),

    /// End of the user's utterance; the gateway flushes partial recognition.
    EndAudioStream(EmptyPayload),
}

impl ClientMessage {
    /// Envelope `event` name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::StartSession(_) => "start-session",
            Self::SendAudio(_) => "send-audio",
            Self::SendVideo(_) => "send-video",
            Self::SendText(_) => "send-text",
            Self::SendToolResponse(_) => "send-tool-response",
            Self::EndAudioStream(_) => "end-audio-stream",
        }
    }

    /// Serialize to the JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// `send-audio` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioPayload {
    /// Base64 PCM16 LE bytes.
    pub audio: String,
    /// e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

/// `send-video` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    /// Base64 encoded frame.
    pub video: String,
    /// e.g. `image/jpeg`.
    pub mime_type: String,
}

/// `send-text` / `text-response` / transcription payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

/// `send-tool-response` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponsePayload {
    pub function_responses: Vec<FunctionResponse>,
}

/// Result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

// ── Inbound ────────────────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Messages received from the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Socket accepted by the gateway.
    Connected,
    /// Session negotiated; streaming may begin.
    SessionStarted,
    /// Upstream model finished its own setup.
    SetupComplete,
    /// One fragment of model audio.
    AudioResponse {
        audio: String,
        mime_type: Option<String>,
    },
    /// Model text delta.
    TextResponse { text: String },
    /// User speech recognised as text.
    InputTranscription { text: String },
    /// Model speech recognised as text.
    OutputTranscription { text: String },
    /// The model finished its turn.
    TurnComplete,
    /// The model detected barge-in; stale audio must stop now.
    Interrupted,
    /// The gateway ended the session but kept the socket open.
    SessionEnded { reason: Option<String> },
    /// Gateway-reported failure.
    Error { message: String },
    /// The model asked for tool execution.
    ToolCall { calls: Vec<FunctionCall> },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioResponseData {
    audio: String,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MessageData {
    message: Option<String>,
    reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallData {
    #[serde(default)]
    function_calls: Vec<FunctionCall>,
}

impl ServerMessage {
    /// Parse one inbound text frame.
    ///
    /// Returns `Ok(None)` for well-formed envelopes with an unknown `type`.
    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let kind = raw.kind.as_str();
        let data = raw.data;

        let message = match kind {
            "connected" => Self::Connected,
            "session-started" => Self::SessionStarted,
            "setup-complete" => Self::SetupComplete,
            "audio-response" => {
                let payload: AudioResponseData = decode(kind, data)?;
                Self::AudioResponse {
                    audio: payload.audio,
                    mime_type: payload.mime_type,
                }
            }
            "text-response" => Self::TextResponse {
                text: decode::<TextPayload>(kind, data)?.text,
            },
            "input-transcription" => Self::InputTranscription {
                text: decode::<TextPayload>(kind, data)?.text,
            },
            "output-transcription" => Self::OutputTranscription {
                text: decode::<TextPayload>(kind, data)?.text,
            },
            "turn-complete" => Self::TurnComplete,
            "interrupted" => Self::Interrupted,
            "session-closed" | "session-ended" => Self::SessionEnded {
                reason: decode::<MessageData>(kind, data)?.reason,
            },
            "error" => Self::Error {
                message: decode::<MessageData>(kind, data)?
                    .message
                    .unwrap_or_else(|| "Unknown server error".to_string()),
            },
            "tool-call" => Self::ToolCall {
                calls: decode::<ToolCallData>(kind, data)?.function_calls,
            },
            _ => return Ok(None),
        };

        Ok(Some(message))
    }

    /// Envelope `type` name (`session-ended` for both session-end aliases).
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::SessionStarted => "session-started",
            Self::SetupComplete => "setup-complete",
            Self::AudioResponse { .. } => "audio-response",
            Self::TextResponse { .. } => "text-response",
            Self::InputTranscription { .. } => "input-transcription",
            Self::OutputTranscription { .. } => "output-transcription",
            Self::TurnComplete => "turn-complete",
            Self::Interrupted => "interrupted",
            Self::SessionEnded { .. } => "session-ended",
            Self::Error { .. } => "error",
            Self::ToolCall { .. } => "tool-call",
        }
    }
}

/// Decode `data` for a known type. An absent or `null` data field reads as `{}`.
fn decode<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, ProtocolError> {
    let data = if data.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

/// Envelope encode/decode failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not a JSON envelope with a string `type`.
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Known `type`, but `data` does not match its schema.
    #[error("Invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// Outbound serialization failed.
    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn send_audio_envelope_shape() {
        let msg = ClientMessage::SendAudio(AudioPayload {
            audio: "AAA=".into(),
            mime_type: "audio/pcm;rate=16000".into(),
        });
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "event": "send-audio", "data": { "audio": "AAA=", "mimeType": "audio/pcm;rate=16000" } })
        );
    }

    #[test]
    fn send_text_envelope_shape() {
        let msg = ClientMessage::SendText(TextPayload { text: "Hi".into() });
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "send-text", "data": { "text": "Hi" } }));
    }

    #[test]
    fn start_session_omits_unset_fields() {
        let config = SessionConfig {
            system_instruction: Some("Be brief".into()),
            ..SessionConfig::default()
        };
        let value: Value =
            serde_json::from_str(&ClientMessage::StartSession(config).to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "event": "start-session", "data": { "systemInstruction": "Be brief" } })
        );
    }

    #[test]
    fn end_audio_stream_carries_empty_object() {
        let msg = ClientMessage::EndAudioStream(EmptyPayload::default());
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "end-audio-stream", "data": {} }));
    }

    #[test]
    fn event_names_match_serialized_tags() {
        let messages = [
            ClientMessage::StartSession(SessionConfig::default()),
            ClientMessage::SendText(TextPayload { text: String::new() }),
            ClientMessage::SendToolResponse(ToolResponsePayload {
                function_responses: vec![],
            }),
            ClientMessage::EndAudioStream(EmptyPayload {}),
        ];
        for msg in messages {
            let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
            assert_eq!(value["event"], msg.event_name());
        }
    }

    #[test]
    fn parses_session_started_without_data() {
        let msg = ServerMessage::parse(r#"{"type":"session-started"}"#).unwrap();
        assert_eq!(msg, Some(ServerMessage::SessionStarted));
    }

    #[test]
    fn parses_audio_response_with_optional_mime() {
        let msg = ServerMessage::parse(r#"{"type":"audio-response","data":{"audio":"AQI="}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::AudioResponse {
                audio: "AQI=".into(),
                mime_type: None
            }
        );
    }

    #[test]
    fn parses_error_message() {
        let msg = ServerMessage::parse(r#"{"type":"error","data":{"message":"quota exceeded"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            Some(ServerMessage::Error {
                message: "quota exceeded".into()
            })
        );
    }

    #[test]
    fn both_session_end_aliases_parse() {
        for kind in ["session-closed", "session-ended"] {
            let text = format!(r#"{{"type":"{kind}"}}"#);
            let msg = ServerMessage::parse(&text).unwrap();
            assert_eq!(msg, Some(ServerMessage::SessionEnded { reason: None }));
        }
    }

    #[test]
    fn parses_tool_call() {
        let text = json!({
            "type": "tool-call",
            "data": { "functionCalls": [{ "id": "c1", "name": "lookup", "args": { "q": "rust" } }] }
        })
        .to_string();
        let Some(ServerMessage::ToolCall { calls }) = ServerMessage::parse(&text).unwrap() else {
            panic!("expected tool call");
        };
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup");
        assert_eq!(calls[0].args["q"], "rust");
    }

    #[test]
    fn unknown_type_is_ignored() {
        let msg = ServerMessage::parse(r#"{"type":"usage-metadata","data":{"tokens":3}}"#).unwrap();
        assert_eq!(msg, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = ServerMessage::parse("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn text_response_without_text_is_invalid_payload() {
        let err = ServerMessage::parse(r#"{"type":"text-response","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref kind, .. } if kind == "text-response"));
    }
}
