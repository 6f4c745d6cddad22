//! Device-free audio ports.
//!
//! - [`NoInput`]: a machine without a microphone; `open` always fails.
//! - [`PushInput`]: frames are pushed by the host program through a
//!   [`PushFeeder`] (file playback into a session, tests).
//! - [`SilentOutput`]: consumes fragments in real time without a speaker, so
//!   queue timing behaves as it would on a device. Every fragment is logged
//!   with its start and end instants.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio_io::{
    AudioInput, AudioOutput, CaptureConstraints, FrameCallback, InputStream, PlaybackDone,
};
use crate::error::AudioError;

// ── NoInput ────────────────────────────────────────────────────────

/// Input port for hosts without a microphone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl AudioInput for NoInput {
    fn open(
        &self,
        _constraints: CaptureConstraints,
        _on_frame: FrameCallback,
    ) -> Result<Box<dyn InputStream>, AudioError> {
        Err(AudioError::NoInputDevice)
    }
}

// ── PushInput ──────────────────────────────────────────────────────

type CallbackSlot = Arc<Mutex<Option<FrameCallback>>>;

/// Input port whose frames come from a [`PushFeeder`].
pub struct PushInput {
    slot: CallbackSlot,
}

/// Producer half of a [`PushInput`].
#[derive(Clone)]
pub struct PushFeeder {
    slot: CallbackSlot,
}

impl PushInput {
    #[must_use]
    pub fn new() -> (Self, PushFeeder) {
        let slot: CallbackSlot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            PushFeeder { slot },
        )
    }
}

impl AudioInput for PushInput {
    fn open(
        &self,
        constraints: CaptureConstraints,
        on_frame: FrameCallback,
    ) -> Result<Box<dyn InputStream>, AudioError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(AudioError::InputStreamError(
                "push input is already open".into(),
            ));
        }
        *slot = Some(on_frame);
        tracing::debug!(sample_rate = constraints.sample_rate, "Push input opened");

        Ok(Box::new(PushStream {
            slot: Arc::clone(&self.slot),
        }))
    }
}

impl PushFeeder {
    /// Deliver one frame of mono samples. Dropped when no stream is open.
    pub fn push(&self, frame: &[f32]) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(on_frame) = slot.as_mut() {
            on_frame(frame);
        }
    }

    /// Whether a capture stream is currently attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

struct PushStream {
    slot: CallbackSlot,
}

impl InputStream for PushStream {
    fn detach(&mut self) -> Result<(), AudioError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn stop_tracks(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

// ── SilentOutput ───────────────────────────────────────────────────

/// One fragment handed to a [`SilentOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedFragment {
    pub samples: usize,
    pub sample_rate: u32,
    pub started: Instant,
    /// When the fragment ran out or was cut; `None` while it is playing.
    pub ended: Option<Instant>,
}

type History = Arc<Mutex<Vec<PlayedFragment>>>;

/// Output port that "plays" fragments by waiting out their duration.
///
/// Must be used from within a tokio runtime.
#[derive(Default)]
pub struct SilentOutput {
    current: Mutex<Option<JoinHandle<()>>>,
    history: History,
    inits: AtomicUsize,
    stops: AtomicUsize,
}

impl SilentOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the playback context was created.
    #[must_use]
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// Number of fragments started.
    #[must_use]
    pub fn played(&self) -> usize {
        lock_history(&self.history).len()
    }

    /// Every fragment started so far, in start order.
    #[must_use]
    pub fn history(&self) -> Vec<PlayedFragment> {
        lock_history(&self.history).clone()
    }

    /// Mark the most recent fragment as ended now, if it is still playing.
    fn cut_current(&self) {
        if let Some(last) = lock_history(&self.history).last_mut() {
            if last.ended.is_none() {
                last.ended = Some(Instant::now());
            }
        }
    }

    /// Number of `stop` calls.
    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioOutput for SilentOutput {
    fn init(&self) -> Result<(), AudioError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<PlaybackDone, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat("sample rate 0".into()));
        }
        #[allow(clippy::cast_precision_loss)]
        let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate));
        let (done_tx, done_rx) = oneshot::channel();

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.take() {
            previous.abort();
            self.cut_current();
        }

        let index = {
            let mut history = lock_history(&self.history);
            history.push(PlayedFragment {
                samples: samples.len(),
                sample_rate,
                started: Instant::now(),
                ended: None,
            });
            history.len() - 1
        };

        let history = Arc::clone(&self.history);
        *current = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(fragment) = lock_history(&history).get_mut(index) {
                fragment.ended = Some(Instant::now());
            }
            let _ = done_tx.send(());
        }));
        Ok(done_rx)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
            self.cut_current();
        }
    }

    fn close(&self) {
        self.stop();
    }
}

fn lock_history(history: &History) -> std::sync::MutexGuard<'_, Vec<PlayedFragment>> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}
