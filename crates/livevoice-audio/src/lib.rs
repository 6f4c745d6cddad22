//! Audio side of a live voice session.
//!
//! - [`capture::CapturePipeline`] turns microphone frames into fixed-size,
//!   base64 PCM16 chunks and hands them to a [`capture::ChunkSink`].
//! - [`playback::PlaybackQueue`] plays gateway audio fragments strictly in
//!   arrival order and supports an immediate hard interrupt.
//!
//! Devices sit behind the [`audio_io::AudioInput`] / [`audio_io::AudioOutput`]
//! ports. The `local-audio` feature provides cpal/rodio implementations on a
//! dedicated audio thread; [`headless`] provides device-free ones.

pub mod audio_io;
pub mod capture;
pub mod chunker;
pub mod error;
pub mod gate;
pub mod headless;
pub mod pcm;
pub mod playback;

#[cfg(feature = "local-audio")]
pub mod audio_local;
#[cfg(feature = "local-audio")]
mod audio_thread;
#[cfg(feature = "local-audio")]
mod device_capture;
#[cfg(feature = "local-audio")]
mod device_playback;

// Re-export key types for convenience
pub use audio_io::{AudioInput, AudioOutput, CaptureConstraints, FrameCallback, InputStream};
pub use capture::{CapturePipeline, ChunkSink};
pub use error::AudioError;
pub use gate::EchoGate;
pub use headless::{NoInput, PlayedFragment, PushFeeder, PushInput, SilentOutput};
pub use playback::{PlaybackItem, PlaybackQueue};
