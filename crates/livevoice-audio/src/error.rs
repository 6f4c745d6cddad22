//! Audio error types.

/// Errors from capture, playback, and payload decoding.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No audio input device found.
    #[error("No audio input device found")]
    NoInputDevice,

    /// Failed to open or control the audio input stream.
    #[error("Failed to open audio input stream: {0}")]
    InputStreamError(String),

    /// Failed to open or control the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// The device cannot deliver or accept the requested format.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Audio resampling error.
    #[error("Audio resampling failed: {0}")]
    ResampleError(String),

    /// A fragment payload could not be decoded.
    #[error("Audio payload could not be decoded: {0}")]
    Decode(String),

    /// The audio I/O thread exited unexpectedly.
    #[error("Audio thread is no longer running")]
    AudioThreadDied,

    /// The playback queue was disposed.
    #[error("Playback queue has been disposed")]
    Disposed,
}
