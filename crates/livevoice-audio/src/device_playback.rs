//! Speaker output via `rodio`.
//!
//! One sink is reused across fragments; the queue only appends a fragment
//! after the previous one has finished, so the sink holds at most one source.

use std::sync::Arc;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;

use crate::error::AudioError;

/// Playback context on the default output device.
pub(crate) struct DevicePlayback {
    /// rodio output stream (must be kept alive).
    _stream: OutputStream,

    /// Handle used to create sinks.
    stream_handle: OutputStreamHandle,

    /// Sink for the current fragment, if any.
    sink: Option<Arc<Sink>>,
}

impl DevicePlayback {
    pub(crate) fn open() -> Result<Self, AudioError> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| AudioError::OutputStreamError(e.to_string()))?;

        tracing::info!("Audio playback initialized on default output device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
        })
    }

    /// Append one mono fragment; `done` fires when the sink drains.
    pub(crate) fn play(
        &mut self,
        samples: Vec<f32>,
        sample_rate: u32,
        done: oneshot::Sender<()>,
    ) -> Result<(), AudioError> {
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => {
                let sink = Arc::new(
                    Sink::try_new(&self.stream_handle)
                        .map_err(|e| AudioError::OutputStreamError(e.to_string()))?,
                );
                self.sink = Some(Arc::clone(&sink));
                sink
            }
        };

        sink.append(SamplesBuffer::new(1, sample_rate, samples));

        // `sleep_until_end` returns when the source drains or when `stop`
        // clears the sink.
        std::thread::Builder::new()
            .name("livevoice-playback-watch".into())
            .spawn(move || {
                sink.sleep_until_end();
                let _ = done.send(());
            })
            .map_err(|e| AudioError::OutputStreamError(format!("failed to spawn watcher: {e}")))?;

        Ok(())
    }

    /// Cut the current fragment. The next `play` creates a fresh sink.
    pub(crate) fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            tracing::debug!("Audio playback stopped");
        }
    }
}

impl Drop for DevicePlayback {
    fn drop(&mut self) {
        self.stop();
    }
}
