//! Dedicated audio I/O thread: isolates `!Send` audio resources from the async runtime.
//!
//! `cpal::Stream` (capture) and `rodio::OutputStream` (playback) are `!Send`
//! on some platforms. Both are confined to one OS thread and driven through
//! [`AudioCommand`]s. The capture and playback contexts are created lazily
//! and independently, so a machine with only a speaker can still play.

use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::audio_io::{CaptureConstraints, PlaybackDone};
use crate::device_capture::{CallbackSlot, DeviceCapture};
use crate::device_playback::DevicePlayback;
use crate::error::AudioError;

type Reply<T> = mpsc::Sender<Result<T, AudioError>>;

// ── Commands ───────────────────────────────────────────────────────

enum AudioCommand {
    /// Open the microphone, feeding frames into `slot`.
    OpenCapture {
        constraints: CaptureConstraints,
        slot: CallbackSlot,
        reply: Reply<()>,
    },

    /// Pause the microphone without releasing it.
    PauseCapture { reply: Reply<()> },

    /// Release the microphone.
    CloseCapture { reply: Reply<()> },

    /// Open the output device.
    InitPlayback { reply: Reply<()> },

    /// Append one fragment; `done` fires when it has played.
    Play {
        samples: Vec<f32>,
        sample_rate: u32,
        done: oneshot::Sender<()>,
        reply: Reply<()>,
    },

    /// Cut the current fragment (fire-and-forget).
    StopPlayback,

    /// Release the output device (fire-and-forget).
    ClosePlayback,

    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated audio I/O thread.
///
/// Request–reply methods block the caller until the audio thread responds.
pub(crate) struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    pub(crate) fn spawn() -> Result<Self, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();

        let thread = thread::Builder::new()
            .name("livevoice-audio".into())
            .spawn(move || Self::run(&cmd_rx))
            .map_err(|e| {
                AudioError::OutputStreamError(format!("failed to spawn audio thread: {e}"))
            })?;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    // ── Capture ────────────────────────────────────────────────────

    pub(crate) fn open_capture(
        &self,
        constraints: CaptureConstraints,
        slot: CallbackSlot,
    ) -> Result<(), AudioError> {
        self.send_and_recv(|reply| AudioCommand::OpenCapture {
            constraints,
            slot,
            reply,
        })
    }

    pub(crate) fn pause_capture(&self) -> Result<(), AudioError> {
        self.send_and_recv(|reply| AudioCommand::PauseCapture { reply })
    }

    pub(crate) fn close_capture(&self) -> Result<(), AudioError> {
        self.send_and_recv(|reply| AudioCommand::CloseCapture { reply })
    }

    // ── Playback ───────────────────────────────────────────────────

    pub(crate) fn init_playback(&self) -> Result<(), AudioError> {
        self.send_and_recv(|reply| AudioCommand::InitPlayback { reply })
    }

    pub(crate) fn play(&self, samples: Vec<f32>, sample_rate: u32) -> Result<PlaybackDone, AudioError> {
        let (done, done_rx) = oneshot::channel();
        self.send_and_recv(|reply| AudioCommand::Play {
            samples,
            sample_rate,
            done,
            reply,
        })?;
        Ok(done_rx)
    }

    pub(crate) fn stop_playback(&self) {
        let _ = self.cmd_tx.send(AudioCommand::StopPlayback);
    }

    pub(crate) fn close_playback(&self) {
        let _ = self.cmd_tx.send(AudioCommand::ClosePlayback);
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Send a command and block for its reply. Channel failures map to
    /// [`AudioError::AudioThreadDied`].
    fn send_and_recv<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> AudioCommand,
    ) -> Result<T, AudioError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| AudioError::AudioThreadDied)?;
        rx.recv().map_err(|_| AudioError::AudioThreadDied)?
    }

    // ── Audio thread event loop ────────────────────────────────────

    /// Owns the device contexts for their entire lifetime; they never cross
    /// thread boundaries.
    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>) {
        let mut capture: Option<DeviceCapture> = None;
        let mut playback: Option<DevicePlayback> = None;

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::OpenCapture {
                    constraints,
                    slot,
                    reply,
                } => {
                    // Release any previous stream before opening a new one.
                    capture = None;
                    let result = DeviceCapture::open(constraints, slot).map(|c| {
                        capture = Some(c);
                    });
                    let _ = reply.send(result);
                }

                AudioCommand::PauseCapture { reply } => {
                    let result = capture.as_ref().map_or(Ok(()), DeviceCapture::pause);
                    let _ = reply.send(result);
                }

                AudioCommand::CloseCapture { reply } => {
                    capture = None;
                    let _ = reply.send(Ok(()));
                }

                AudioCommand::InitPlayback { reply } => {
                    let result = if playback.is_some() {
                        Ok(())
                    } else {
                        DevicePlayback::open().map(|p| {
                            playback = Some(p);
                        })
                    };
                    let _ = reply.send(result);
                }

                AudioCommand::Play {
                    samples,
                    sample_rate,
                    done,
                    reply,
                } => {
                    let result = match playback.as_mut() {
                        Some(p) => p.play(samples, sample_rate, done),
                        None => Err(AudioError::OutputStreamError(
                            "playback not initialized".into(),
                        )),
                    };
                    let _ = reply.send(result);
                }

                AudioCommand::StopPlayback => {
                    if let Some(p) = playback.as_mut() {
                        p.stop();
                    }
                }

                AudioCommand::ClosePlayback => playback = None,

                AudioCommand::Shutdown => break,
            }
        }

        // Device contexts are dropped here, on the audio thread.
        tracing::debug!("Audio thread shutting down");
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        // Best-effort shutdown; the thread may already be dead.
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
