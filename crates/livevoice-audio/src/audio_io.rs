//! `AudioInput` and `AudioOutput` ports between the session and the devices.
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`LocalAudioInput`](crate::audio_local::LocalAudioInput) / [`LocalAudioOutput`](crate::audio_local::LocalAudioOutput) | CLI `talk`: cpal capture + rodio playback (`local-audio` feature) |
//! | [`PushInput`](crate::headless::PushInput) | Frames fed by the host program (files, tests) |
//! | [`NoInput`](crate::headless::NoInput) / [`SilentOutput`](crate::headless::SilentOutput) | Text-only sessions, tests |
//!
//! Both traits are object-safe and take `&self`; implementations use interior
//! mutability (channels, atomics) for state changes.

use tokio::sync::oneshot;

use crate::error::AudioError;

/// Per-frame capture callback. Receives mono f32 samples at the constrained
/// sample rate, in device order.
pub type FrameCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Resolves when a fragment handed to [`AudioOutput::play`] has finished.
///
/// The sender is dropped without a value when playback is cut short, so
/// awaiting it always terminates.
pub type PlaybackDone = oneshot::Receiver<()>;

/// What the capture pipeline asks of the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl CaptureConstraints {
    #[must_use]
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

// ── AudioInput ─────────────────────────────────────────────────────

/// Abstraction over a microphone.
pub trait AudioInput: Send + Sync {
    /// Acquire the device and start delivering frames to `on_frame`.
    ///
    /// Frames may begin arriving before this returns.
    fn open(
        &self,
        constraints: CaptureConstraints,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn InputStream>, AudioError>;
}

/// A live capture stream returned by [`AudioInput::open`].
///
/// Teardown is split into three steps so a failure in one does not prevent
/// the others. Dropping the stream releases whatever is left.
pub trait InputStream: Send {
    /// Stop invoking the frame callback.
    fn detach(&mut self) -> Result<(), AudioError>;

    /// Stop the device tracks.
    fn stop_tracks(&mut self) -> Result<(), AudioError>;

    /// Release the device and its processing context.
    fn close(&mut self) -> Result<(), AudioError>;
}

// ── AudioOutput ────────────────────────────────────────────────────

/// Abstraction over a speaker.
pub trait AudioOutput: Send + Sync {
    /// Create the playback context. Called once, before the first fragment.
    fn init(&self) -> Result<(), AudioError>;

    /// Start playing one mono fragment.
    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<PlaybackDone, AudioError>;

    /// Cut the current fragment short. No-op when idle.
    fn stop(&self);

    /// Release the playback context.
    fn close(&self);
}
