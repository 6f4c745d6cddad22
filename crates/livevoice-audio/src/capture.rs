//! Capture pipeline: microphone frames → fixed windows → base64 PCM16 chunks.
//!
//! Per frame, in order:
//!
//! 1. drop the frame unless recording is active;
//! 2. drop it while model audio plays, if `gate_during_playback` is set;
//! 3. accumulate into windows of `chunk_size` samples;
//! 4. encode each full window (clamp → PCM16 LE → base64);
//! 5. hand it to the [`ChunkSink`] together with the mime type.
//!
//! The recording flag is raised only once the device is open, so frames the
//! device delivers while `open` is still running are discarded.
//!
//! Echo cancellation is a device constraint: it filters the signal, it does
//! not mute it. Frames keep flowing while the model talks so the gateway can
//! hear the user barge in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use livevoice_core::CaptureSettings;

use crate::audio_io::{AudioInput, CaptureConstraints, FrameCallback, InputStream};
use crate::chunker::FrameChunker;
use crate::error::AudioError;
use crate::gate::EchoGate;
use crate::pcm;

/// Destination of encoded capture chunks (the gateway connection).
pub trait ChunkSink: Send + Sync {
    /// Forward one base64 PCM16 chunk.
    fn send_chunk(&self, audio: String, mime_type: &str);

    /// Signal that the microphone stream has ended.
    fn end_of_stream(&self);
}

/// Microphone capture for one session.
pub struct CapturePipeline {
    input: Arc<dyn AudioInput>,
    settings: CaptureSettings,
    gate: EchoGate,
    recording: Arc<AtomicBool>,
    stream: Mutex<Option<Box<dyn InputStream>>>,
}

impl CapturePipeline {
    #[must_use]
    pub fn new(input: Arc<dyn AudioInput>, settings: CaptureSettings, gate: EchoGate) -> Self {
        Self {
            input,
            settings,
            gate,
            recording: Arc::new(AtomicBool::new(false)),
            stream: Mutex::new(None),
        }
    }

    /// Open the microphone and start streaming chunks into `sink`.
    ///
    /// A second call while recording is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the device error when the microphone cannot be opened. The
    /// pipeline stays idle in that case.
    pub fn start(&self, sink: Arc<dyn ChunkSink>) -> Result<(), AudioError> {
        let mut slot = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::warn!("Recording already active, ignoring start");
            return Ok(());
        }

        if self.settings.noise_suppression {
            tracing::debug!("Noise suppression requested but unavailable; capturing raw audio");
        }

        let constraints = CaptureConstraints {
            echo_cancellation: self.settings.echo_cancellation,
            noise_suppression: self.settings.noise_suppression,
            ..CaptureConstraints::mono(self.settings.sample_rate)
        };
        let on_frame = self.frame_callback(sink);

        let stream = self.input.open(constraints, on_frame)?;
        *slot = Some(stream);
        self.recording.store(true, Ordering::SeqCst);

        tracing::info!(
            sample_rate = self.settings.sample_rate,
            chunk_size = self.settings.chunk_size,
            "Recording started"
        );
        Ok(())
    }

    /// Stop recording: signal end-of-stream to `sink`, then tear down.
    ///
    /// The four teardown steps (detach callback, stop tracks, close device,
    /// drop handles) run independently; a failing step is logged and the
    /// rest still run. Returns whether a recording was actually stopped.
    pub fn stop(&self, sink: &dyn ChunkSink) -> bool {
        let stream = self
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let was_recording = self.recording.swap(false, Ordering::SeqCst);

        let Some(mut stream) = stream else {
            return false;
        };

        if was_recording {
            sink.end_of_stream();
        }

        if let Err(e) = stream.detach() {
            tracing::warn!(error = %e, "Failed to detach capture callback");
        }
        if let Err(e) = stream.stop_tracks() {
            tracing::warn!(error = %e, "Failed to stop capture tracks");
        }
        if let Err(e) = stream.close() {
            tracing::warn!(error = %e, "Failed to close capture device");
        }
        drop(stream);

        tracing::info!("Recording stopped");
        true
    }

    /// Whether frames are currently being turned into chunks.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn frame_callback(&self, sink: Arc<dyn ChunkSink>) -> FrameCallback {
        let recording = Arc::clone(&self.recording);
        let gate = self.gate.clone();
        let gated = self.settings.gate_during_playback;
        let mime_type = self.settings.mime_type();
        let mut chunker = FrameChunker::new(self.settings.chunk_size.max(1));

        Box::new(move |frame: &[f32]| {
            if !recording.load(Ordering::Relaxed) {
                return;
            }
            if gated && gate.is_playing() {
                return;
            }
            chunker.push(frame, |window| {
                sink.send_chunk(pcm::encode_base64(window), &mime_type);
            });
        })
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.recording.store(false, Ordering::SeqCst);
    }
}
