//! Gateway client for livevoice.
//!
//! - [`connection`]: one WebSocket to the voice gateway, its state machine,
//!   and inbound dispatch.
//! - [`session`]: the [`VoiceSession`] orchestrator tying the connection to
//!   microphone capture, playback, and transcripts.

pub mod connection;
pub mod session;

pub use connection::{ConnectionError, ConnectionEvent, ConnectionManager};
pub use session::VoiceSession;
