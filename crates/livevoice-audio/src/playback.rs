//! Playback queue for gateway audio.
//!
//! Fragments play strictly one at a time, in arrival order, through a single
//! drain worker. [`PlaybackQueue::stop`] is the hard interrupt: it empties
//! the queue, cuts the current fragment, and invalidates any fragment the
//! worker was about to start. A generation counter, bumped on every stop,
//! is what the worker checks before starting a fragment.
//!
//! `PlaybackStarted` is emitted on the idle → active transition and
//! `PlaybackFinished` on the matching active → idle transition (drain or
//! interrupt), so each pair is emitted at most once per drain cycle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livevoice_core::SessionEvent;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use crate::audio_io::{AudioOutput, PlaybackDone};
use crate::error::AudioError;
use crate::gate::EchoGate;
use crate::pcm;

/// One fragment of model audio as received from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackItem {
    /// Base64 PCM16 LE payload.
    pub audio: String,
    /// Media type; `None` means PCM at the default playback rate.
    pub mime_type: Option<String>,
}

impl PlaybackItem {
    #[must_use]
    pub fn new(audio: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            audio: audio.into(),
            mime_type,
        }
    }

    fn decode(&self) -> Result<(Vec<f32>, u32), AudioError> {
        let sample_rate = pcm::pcm_sample_rate(self.mime_type.as_deref())?;
        let samples = pcm::decode_base64(&self.audio)?;
        Ok((samples, sample_rate))
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PlaybackItem>,
    active: bool,
    generation: u64,
    initialized: bool,
    disposed: bool,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    gate: EchoGate,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Active → idle, if still in `generation` and nothing is left.
    fn finish_if_drained(&self, generation: u64) {
        {
            let mut state = self.lock();
            if state.generation != generation || !state.pending.is_empty() || !state.active {
                return;
            }
            state.active = false;
        }
        self.gate.close_playback();
        tracing::debug!("Playback queue drained");
        self.emit(SessionEvent::PlaybackFinished);
    }
}

/// FIFO of model audio fragments with an immediate interrupt.
pub struct PlaybackQueue {
    shared: Arc<Shared>,
    output: Arc<dyn AudioOutput>,
}

impl PlaybackQueue {
    /// Create an idle queue. Playback lifecycle events go to `events`.
    #[must_use]
    pub fn new(
        output: Arc<dyn AudioOutput>,
        gate: EchoGate,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                wake: Notify::new(),
                gate,
                events,
            }),
            output,
        }
    }

    /// Create the playback context and start the drain worker.
    ///
    /// Idempotent. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the output error if the playback context cannot be created,
    /// or [`AudioError::Disposed`] after [`dispose`](Self::dispose).
    pub fn init(&self) -> Result<(), AudioError> {
        let mut state = self.shared.lock();
        if state.disposed {
            return Err(AudioError::Disposed);
        }
        if state.initialized {
            return Ok(());
        }

        self.output.init()?;
        state.initialized = true;
        state.worker = Some(tokio::spawn(drain(
            Arc::clone(&self.shared),
            Arc::clone(&self.output),
        )));

        tracing::debug!("Playback queue initialized");
        Ok(())
    }

    /// Append a fragment. Undecodable fragments are skipped by the worker.
    pub fn queue_audio(&self, item: PlaybackItem) {
        let started = {
            let mut state = self.shared.lock();
            if state.disposed {
                tracing::debug!("Playback queue disposed, dropping fragment");
                return;
            }
            state.pending.push_back(item);
            !std::mem::replace(&mut state.active, true)
        };

        if started {
            self.shared.gate.open_playback();
            self.shared.emit(SessionEvent::PlaybackStarted);
        }
        self.shared.wake.notify_one();
    }

    /// Interrupt: drop pending fragments and cut the current one.
    ///
    /// Synchronous; when it returns nothing queued before the call will play.
    pub fn stop(&self) {
        let (was_active, dropped) = {
            let mut state = self.shared.lock();
            state.generation = state.generation.wrapping_add(1);
            let dropped = state.pending.len();
            state.pending.clear();
            (std::mem::replace(&mut state.active, false), dropped)
        };

        self.output.stop();

        if was_active {
            self.shared.gate.close_playback();
            tracing::debug!(dropped, "Playback interrupted");
            self.shared.emit(SessionEvent::PlaybackFinished);
        }
    }

    /// Stop and release the playback context. The queue accepts nothing
    /// afterwards.
    pub fn dispose(&self) {
        self.stop();

        let (worker, initialized) = {
            let mut state = self.shared.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (state.worker.take(), state.initialized)
        };

        if let Some(worker) = worker {
            worker.abort();
        }
        if initialized {
            self.output.close();
        }
        tracing::debug!("Playback queue disposed");
    }

    /// Whether a drain cycle is in progress.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.shared.lock().active
    }

    /// Fragments waiting behind the current one.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        if let Some(worker) = self.shared.lock().worker.take() {
            worker.abort();
        }
    }
}

// ── Drain worker ───────────────────────────────────────────────────

async fn drain(shared: Arc<Shared>, output: Arc<dyn AudioOutput>) {
    loop {
        let next = {
            let mut state = shared.lock();
            if state.disposed {
                return;
            }
            let generation = state.generation;
            state.pending.pop_front().map(|item| (item, generation))
        };

        let Some((item, generation)) = next else {
            shared.wake.notified().await;
            continue;
        };

        if let Some(done) = begin_fragment(&shared, output.as_ref(), &item, generation) {
            // Err means the fragment was cut short; either way it is over.
            let _ = done.await;
        }
        shared.finish_if_drained(generation);
    }
}

/// Start `item` unless a stop happened since it was dequeued.
fn begin_fragment(
    shared: &Shared,
    output: &dyn AudioOutput,
    item: &PlaybackItem,
    generation: u64,
) -> Option<PlaybackDone> {
    let (samples, sample_rate) = match item.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, mime_type = ?item.mime_type, "Skipping audio fragment");
            return None;
        }
    };

    if shared.lock().generation != generation {
        return None;
    }
    // The lock is not held across `play`: outputs may call back into the
    // queue. A stop landing in between is caught by the second check.
    let done = match output.play(samples, sample_rate) {
        Ok(done) => done,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to play audio fragment");
            return None;
        }
    };
    if shared.lock().generation != generation {
        output.stop();
        return None;
    }
    Some(done)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::headless::SilentOutput;

    /// 0.1 s of audio at 24 kHz.
    fn fragment() -> PlaybackItem {
        fragment_of(2_400)
    }

    fn fragment_of(samples: usize) -> PlaybackItem {
        PlaybackItem::new(
            pcm::encode_base64(&vec![0.25; samples]),
            Some("audio/pcm;rate=24000".into()),
        )
    }

    fn queue() -> (
        PlaybackQueue,
        Arc<SilentOutput>,
        EchoGate,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let output = Arc::new(SilentOutput::new());
        let gate = EchoGate::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = PlaybackQueue::new(
            Arc::clone(&output) as Arc<dyn AudioOutput>,
            gate.clone(),
            tx,
        );
        (queue, output, gate, rx)
    }

    fn drain_events(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn init_is_idempotent() {
        let (queue, output, _gate, _rx) = queue();
        queue.init().unwrap();
        queue.init().unwrap();
        assert_eq!(output.inits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fragments_play_in_order_then_finish_once() {
        let (queue, output, gate, mut rx) = queue();
        queue.init().unwrap();

        for _ in 0..3 {
            queue.queue_audio(fragment());
        }
        assert!(queue.is_playing());
        assert!(gate.is_playing());

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(output.played(), 3);
        assert!(!queue.is_playing());
        assert!(!gate.is_playing());
        assert_eq!(
            drain_events(&mut rx),
            vec![SessionEvent::PlaybackStarted, SessionEvent::PlaybackFinished]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fragments_never_overlap_and_keep_arrival_order() {
        let (queue, output, _gate, _rx) = queue();
        queue.init().unwrap();

        for samples in [2_400, 4_800, 1_200] {
            queue.queue_audio(fragment_of(samples));
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        let history = output.history();
        let order: Vec<usize> = history.iter().map(|f| f.samples).collect();
        assert_eq!(order, vec![2_400, 4_800, 1_200]);
        for pair in history.windows(2) {
            let ended = pair[0].ended.expect("earlier fragment still playing");
            assert!(ended <= pair[1].started, "fragments overlapped: {pair:?}");
        }
        assert!(history.iter().all(|f| f.ended.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drops_pending_and_nothing_plays_afterwards() {
        let (queue, output, gate, mut rx) = queue();
        queue.init().unwrap();

        for _ in 0..5 {
            queue.queue_audio(fragment());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(output.played(), 1);

        queue.stop();
        assert_eq!(queue.pending_len(), 0);
        assert!(!queue.is_playing());
        assert!(!gate.is_playing());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(output.played(), 1);
        assert_eq!(
            drain_events(&mut rx),
            vec![SessionEvent::PlaybackStarted, SessionEvent::PlaybackFinished]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_emits_nothing() {
        let (queue, _output, _gate, mut rx) = queue();
        queue.init().unwrap();
        queue.stop();
        queue.stop();
        assert!(drain_events(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn queue_resumes_after_interrupt() {
        let (queue, output, _gate, mut rx) = queue();
        queue.init().unwrap();

        queue.queue_audio(fragment());
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.stop();

        queue.queue_audio(fragment());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(output.played(), 2);
        assert_eq!(
            drain_events(&mut rx),
            vec![
                SessionEvent::PlaybackStarted,
                SessionEvent::PlaybackFinished,
                SessionEvent::PlaybackStarted,
                SessionEvent::PlaybackFinished,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_fragments_are_skipped() {
        let (queue, output, _gate, mut rx) = queue();
        queue.init().unwrap();

        queue.queue_audio(PlaybackItem::new("AAAA", Some("audio/mpeg".into())));
        queue.queue_audio(PlaybackItem::new("%%%", None));
        queue.queue_audio(fragment());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(output.played(), 1);
        assert_eq!(
            drain_events(&mut rx),
            vec![SessionEvent::PlaybackStarted, SessionEvent::PlaybackFinished]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_releases_context_and_rejects_new_audio() {
        let (queue, output, _gate, _rx) = queue();
        queue.init().unwrap();
        queue.dispose();
        queue.dispose();

        queue.queue_audio(fragment());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(output.played(), 0);
        assert!(!queue.is_playing());
        assert!(matches!(queue.init(), Err(AudioError::Disposed)));
    }

    // ── Re-entrant outputs ─────────────────────────────────────────

    /// Output that interrupts its own queue from inside the first `play`,
    /// the way a device callback might.
    struct StopDuringPlay {
        inner: SilentOutput,
        queue: Mutex<Option<std::sync::Weak<PlaybackQueue>>>,
    }

    impl AudioOutput for StopDuringPlay {
        fn init(&self) -> Result<(), AudioError> {
            self.inner.init()
        }

        fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<PlaybackDone, AudioError> {
            let hook = self.queue.lock().unwrap().take();
            if let Some(queue) = hook.and_then(|weak| weak.upgrade()) {
                queue.stop();
            }
            self.inner.play(samples, sample_rate)
        }

        fn stop(&self) {
            self.inner.stop();
        }

        fn close(&self) {
            self.inner.close();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_from_inside_play_cuts_the_fragment_without_deadlock() {
        let output = Arc::new(StopDuringPlay {
            inner: SilentOutput::new(),
            queue: Mutex::new(None),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = Arc::new(PlaybackQueue::new(
            Arc::clone(&output) as Arc<dyn AudioOutput>,
            EchoGate::new(),
            tx,
        ));
        *output.queue.lock().unwrap() = Some(Arc::downgrade(&queue));
        queue.init().unwrap();

        queue.queue_audio(fragment());
        queue.queue_audio(fragment());
        tokio::time::timeout(Duration::from_secs(1), async {
            while output.inner.played() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("drain worker is stuck");
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(!queue.is_playing());
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(output.inner.played(), 1);
        assert!(output.inner.history()[0].ended.is_some());
        assert_eq!(
            drain_events(&mut rx),
            vec![SessionEvent::PlaybackStarted, SessionEvent::PlaybackFinished]
        );
    }
}
