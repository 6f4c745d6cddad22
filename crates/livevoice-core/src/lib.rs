//! Core domain types for livevoice.
//!
//! This crate has no socket or device dependencies. It defines:
//!
//! - `protocol` - the `{event|type, data}` envelopes exchanged with the gateway
//! - `state` - the connection/session state machine
//! - `config` - session and client settings
//! - `events` - the event union emitted to UI code
//! - `gateway` - WebSocket URL derivation
//! - `transcript` - input/output transcript accumulation
//! - `error` - structured error codes

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod protocol;
pub mod state;
pub mod transcript;

pub use config::{
    CaptureSettings, ClientSettings, ConnectionOptions, GatewaySettings, RealtimeInputConfig,
    SessionConfig,
};
pub use error::{ErrorCode, ErrorInfo, SessionError};
pub use events::SessionEvent;
pub use gateway::{GatewayError, derive_ws_url};
pub use protocol::{
    ClientMessage, FunctionCall, FunctionResponse, ProtocolError, ServerMessage,
};
pub use state::{ConnectionState, StateTrigger};
pub use transcript::Transcript;
