//! Local (cpal/rodio) adapters for the [`AudioInput`] and [`AudioOutput`] ports.
//!
//! [`LocalAudioInput`] and [`LocalAudioOutput`] share a single
//! `Arc<AudioThreadHandle>`: one OS thread owns both the cpal capture stream
//! and the rodio playback context.
//!
//! ```no_run
//! # use livevoice_audio::AudioError;
//! use livevoice_audio::audio_local::new_pair;
//! let (input, output) = new_pair()?;
//! # Ok::<(), AudioError>(())
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::audio_io::{
    AudioInput, AudioOutput, CaptureConstraints, FrameCallback, InputStream, PlaybackDone,
};
use crate::audio_thread::AudioThreadHandle;
use crate::device_capture::CallbackSlot;
use crate::error::AudioError;

// ── LocalAudioInput ────────────────────────────────────────────────

/// Default microphone, driven on the audio thread.
pub struct LocalAudioInput {
    handle: Arc<AudioThreadHandle>,
}

impl AudioInput for LocalAudioInput {
    fn open(
        &self,
        constraints: CaptureConstraints,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn InputStream>, AudioError> {
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(on_frame)));
        self.handle.open_capture(constraints, Arc::clone(&slot))?;
        Ok(Box::new(LocalInputStream {
            handle: Arc::clone(&self.handle),
            slot,
            closed: false,
        }))
    }
}

struct LocalInputStream {
    handle: Arc<AudioThreadHandle>,
    slot: CallbackSlot,
    closed: bool,
}

impl InputStream for LocalInputStream {
    fn detach(&mut self) -> Result<(), AudioError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn stop_tracks(&mut self) -> Result<(), AudioError> {
        self.handle.pause_capture()
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.closed = true;
        self.handle.close_capture()
    }
}

impl Drop for LocalInputStream {
    fn drop(&mut self) {
        let _ = self.detach();
        if !self.closed {
            let _ = self.handle.close_capture();
        }
    }
}

// ── LocalAudioOutput ───────────────────────────────────────────────

/// Default speaker, driven on the audio thread.
pub struct LocalAudioOutput {
    handle: Arc<AudioThreadHandle>,
}

impl AudioOutput for LocalAudioOutput {
    fn init(&self) -> Result<(), AudioError> {
        self.handle.init_playback()
    }

    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<PlaybackDone, AudioError> {
        self.handle.play(samples, sample_rate)
    }

    fn stop(&self) {
        self.handle.stop_playback();
    }

    fn close(&self) {
        self.handle.close_playback();
    }
}

// ── Constructor ────────────────────────────────────────────────────

/// Spawn one audio thread and return an input/output pair sharing it.
///
/// Devices are opened lazily, on first capture and on playback init.
///
/// # Errors
///
/// Returns [`AudioError`] if the audio thread cannot be spawned.
pub fn new_pair() -> Result<(LocalAudioInput, LocalAudioOutput), AudioError> {
    let handle = Arc::new(AudioThreadHandle::spawn()?);
    let input = LocalAudioInput {
        handle: Arc::clone(&handle),
    };
    let output = LocalAudioOutput { handle };
    Ok((input, output))
}
