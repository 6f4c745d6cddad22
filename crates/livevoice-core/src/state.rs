//! Connection/session state machine.
//!
//! ```text
//!   Disconnected → Connecting → Connected → SetupPending → Ready
//!        ▲                          ▲                        │
//!        │                          └──── session ended ─────┤
//!        └──────────── close / disconnect (any) ─────────────┘
//!                      error (any) → Error
//! ```
//!
//! The transition function is total: any (state, trigger) pair not listed in
//! [`ConnectionState::apply`] leaves the state unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current state of a gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,

    /// Transport open in progress.
    Connecting,

    /// Socket open, no session negotiated.
    Connected,

    /// `start-session` sent, waiting for `session-started`.
    SetupPending,

    /// Session negotiated; media and text may flow.
    Ready,

    /// Terminal failure. A new connection manager is required.
    Error,
}

/// Events that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateTrigger {
    /// `connect()` was called.
    ConnectRequested,
    /// The transport reported open.
    TransportOpened,
    /// `start-session` was written to the socket.
    SetupSent,
    /// Inbound `session-started`.
    SessionStarted,
    /// Inbound `session-closed` / `session-ended`.
    SessionEnded,
    /// Inbound `error` envelope.
    ServerError,
    /// Transport failed to open, or failed while open.
    TransportError,
    /// Transport closed by either side.
    TransportClosed,
    /// Local `disconnect()`.
    Disconnect,
}

impl ConnectionState {
    /// Apply a trigger and return the resulting state.
    #[must_use]
    pub const fn apply(self, trigger: StateTrigger) -> Self {
        use ConnectionState as S;
        use StateTrigger as T;

        match (self, trigger) {
            (_, T::TransportClosed | T::Disconnect) => S::Disconnected,
            (_, T::ServerError | T::TransportError) => S::Error,
            (S::Disconnected, T::ConnectRequested) => S::Connecting,
            (S::Disconnected | S::Connecting, T::TransportOpened) => S::Connected,
            (S::Connected, T::SetupSent) => S::SetupPending,
            (S::SetupPending, T::SessionStarted) => S::Ready,
            (S::Ready | S::Connected, T::SessionEnded) => S::Connected,
            (state, _) => state,
        }
    }

    /// Whether outbound media and text may be sent.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Connected)
    }

    /// Whether a socket is (or is about to be) open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::SetupPending | Self::Ready)
    }

    /// Stable lowercase label, matching the serialized form.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::SetupPending => "setup_pending",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
