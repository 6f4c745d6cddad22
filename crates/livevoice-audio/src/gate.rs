//! Echo gate: keeps the model's own voice out of the microphone stream.
//!
//! Native devices have no acoustic echo canceller. With
//! `gate_during_playback` set, the capture pipeline drops microphone frames
//! while the playback queue is active. Off by default, since a gated
//! microphone cannot barge in. The flag is shared between both sides.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "model audio is playing" flag.
///
/// The playback queue raises it on the idle → active transition and lowers it
/// when the queue drains or is interrupted. The capture callback reads it per
/// frame.
#[derive(Debug, Clone, Default)]
pub struct EchoGate {
    playing: Arc<AtomicBool>,
}

impl EchoGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Playback became active; gated capture drops frames from now on.
    pub fn open_playback(&self) {
        if !self.playing.swap(true, Ordering::SeqCst) {
            tracing::debug!("Echo gate: model audio playing, mic gated");
        }
    }

    /// Playback went idle; capture resumes.
    pub fn close_playback(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            tracing::debug!("Echo gate: playback idle, mic open");
        }
    }

    /// Whether model audio is currently playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}
