//! Session and client settings.
//!
//! [`SessionConfig`] is the `start-session` payload and is fixed for the
//! lifetime of one connection. [`ClientSettings`] bundles everything the
//! orchestrator needs to open connections and capture audio.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capture sample rate (16 kHz mono).
pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Samples per capture chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Voice negotiated when none is selected.
pub const DEFAULT_VOICE: &str = "Puck";

/// Default WebSocket path on the gateway.
pub const DEFAULT_SOCKET_PATH: &str = "/ws";

/// Default upper bound on the transport open handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default outbound frame buffer (frames, not bytes).
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Realtime input tuning forwarded to the upstream model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeInputConfig {
    /// Disable server-side voice activity detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_automatic_activity_detection: Option<bool>,

    /// Silence that ends a user turn, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_duration_ms: Option<u32>,
}

impl RealtimeInputConfig {
    const fn is_empty(&self) -> bool {
        self.disable_automatic_activity_detection.is_none() && self.silence_duration_ms.is_none()
    }
}

/// `start-session` payload. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Upstream model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Voice identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_input_transcription: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_output_transcription: Option<bool>,

    /// Token budget for model "thinking"; `0` disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    #[serde(skip_serializing_if = "RealtimeInputConfig::is_empty")]
    pub realtime_input: RealtimeInputConfig,
}

/// Where the gateway lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Configured backend base URL (`https://…`, `http://…`, `wss://…`).
    pub base_url: Option<String>,

    /// Origin of the hosting page, used when no base URL is configured.
    pub page_origin: Option<String>,

    /// WebSocket path appended to the base URL.
    pub socket_path: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: None,
            page_origin: None,
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
        }
    }
}

/// Transport tuning for one connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Upper bound on the open handshake.
    pub connect_timeout: Duration,

    /// Outbound frames buffered ahead of the socket writer. Frames past this
    /// limit are dropped.
    pub outbound_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Microphone capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub chunk_size: usize,
    /// Requested from the input device; the signal is filtered, not muted.
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// Drop microphone frames while model audio plays. Off by default: the
    /// gateway detects barge-in from the user's speech, so muting the mic
    /// would make voice interruptions impossible. Useful on open speakers
    /// without an acoustic echo canceller.
    pub gate_during_playback: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_CAPTURE_SAMPLE_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            echo_cancellation: true,
            noise_suppression: true,
            gate_during_playback: false,
        }
    }
}

impl CaptureSettings {
    /// Mime type attached to each outbound chunk.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Everything the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientSettings {
    pub gateway: GatewaySettings,
    /// Session template; `voice` is overridden by the orchestrator's current voice.
    pub session: SessionConfig,
    pub connection: ConnectionOptions,
    pub capture: CaptureSettings,
}

impl ClientSettings {
    /// Settings with a default voice and both transcriptions enabled.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            session: SessionConfig {
                voice: Some(DEFAULT_VOICE.to_string()),
                enable_input_transcription: Some(true),
                enable_output_transcription: Some(true),
                ..SessionConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn session_config_serializes_camel_case() {
        let config = SessionConfig {
            model: Some("models/live".into()),
            voice: Some("Kore".into()),
            enable_input_transcription: Some(true),
            thinking_budget: Some(0),
            realtime_input: RealtimeInputConfig {
                silence_duration_ms: Some(500),
                ..RealtimeInputConfig::default()
            },
            ..SessionConfig::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "models/live",
                "voice": "Kore",
                "enableInputTranscription": true,
                "thinkingBudget": 0,
                "realtimeInput": { "silenceDurationMs": 500 }
            })
        );
    }

    #[test]
    fn empty_session_config_is_empty_object() {
        let value = serde_json::to_value(SessionConfig::default()).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn capture_mime_type_carries_rate() {
        assert_eq!(CaptureSettings::default().mime_type(), "audio/pcm;rate=16000");
    }

    #[test]
    fn microphone_is_not_gated_by_default() {
        let capture = CaptureSettings::default();
        assert!(capture.echo_cancellation);
        assert!(!capture.gate_during_playback);
    }

    #[test]
    fn with_defaults_selects_default_voice() {
        let settings = ClientSettings::with_defaults();
        assert_eq!(settings.session.voice.as_deref(), Some(DEFAULT_VOICE));
        assert_eq!(settings.capture.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.gateway.socket_path, DEFAULT_SOCKET_PATH);
    }
}
