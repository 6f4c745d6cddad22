//! Microphone input via `cpal`.
//!
//! Opens the default input device, preferring a native config at the
//! requested rate. Frames are downmixed to mono and, when the device cannot
//! run at the requested rate, resampled with `rubato` before reaching the
//! frame callback.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfig};
use rubato::{FftFixedIn, Resampler as _};

use crate::audio_io::{CaptureConstraints, FrameCallback};
use crate::error::AudioError;

/// Frame callback shared between the cpal callback and the stream owner,
/// which clears it to detach.
pub(crate) type CallbackSlot = Arc<Mutex<Option<FrameCallback>>>;

/// Input frames per resampler block.
const RESAMPLE_CHUNK: usize = 1024;

/// A running cpal input stream.
pub(crate) struct DeviceCapture {
    stream: Stream,
}

impl DeviceCapture {
    /// Open the default input device and start streaming into `slot`.
    pub(crate) fn open(constraints: CaptureConstraints, slot: CallbackSlot) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let config = choose_config(&device, constraints.sample_rate)?;
        let device_rate = config.sample_rate().0;
        let channels = config.channels();

        let resampler = if device_rate == constraints.sample_rate {
            None
        } else {
            Some(StreamResampler::new(device_rate, constraints.sample_rate)?)
        };

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            device_rate,
            channels,
            target_rate = constraints.sample_rate,
            resampling = resampler.is_some(),
            "Opening microphone"
        );
        if constraints.noise_suppression {
            tracing::info!("Noise suppression is not available on native input, capturing unprocessed audio");
        }

        let processor = FrameProcessor {
            channels: usize::from(channels.max(1)),
            resampler,
            slot,
        };
        let stream = build_input_stream(&device, &config, processor)?;
        stream
            .play()
            .map_err(|e| AudioError::InputStreamError(e.to_string()))?;

        Ok(Self { stream })
    }

    /// Pause the device without releasing it.
    pub(crate) fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::InputStreamError(e.to_string()))
    }
}

/// Pick a supported config running at `target_rate`, else the device default.
fn choose_config(device: &Device, target_rate: u32) -> Result<SupportedStreamConfig, AudioError> {
    let native = device
        .supported_input_configs()
        .map_err(|e| AudioError::InputStreamError(e.to_string()))?
        .filter(|range| {
            matches!(
                range.sample_format(),
                SampleFormat::F32 | SampleFormat::I16 | SampleFormat::I32
            ) && range.min_sample_rate().0 <= target_rate
                && target_rate <= range.max_sample_rate().0
        })
        .min_by_key(|range| range.channels());

    match native {
        Some(range) => Ok(range.with_sample_rate(SampleRate(target_rate))),
        None => device
            .default_input_config()
            .map_err(|e| AudioError::InputStreamError(e.to_string())),
    }
}

fn build_input_stream(
    device: &Device,
    config: &SupportedStreamConfig,
    mut processor: FrameProcessor,
) -> Result<Stream, AudioError> {
    let stream_config: StreamConfig = config.clone().into();
    let sample_format = config.sample_format();

    let err_fn = |err: cpal::StreamError| {
        tracing::error!(%err, "Audio input stream error");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| processor.process(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let float_data: Vec<f32> = data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                processor.process(&float_data);
            },
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            &stream_config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                #[allow(clippy::cast_precision_loss)]
                let float_data: Vec<f32> =
                    data.iter().map(|&s| s as f32 / 2_147_483_648.0).collect();
                processor.process(&float_data);
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(AudioError::UnsupportedFormat(format!(
                "input sample format {sample_format:?}"
            )));
        }
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
        other => AudioError::InputStreamError(other.to_string()),
    })
}

// ── Per-callback processing ────────────────────────────────────────

/// Downmix → resample → deliver, run inside the cpal callback.
struct FrameProcessor {
    channels: usize,
    resampler: Option<StreamResampler>,
    slot: CallbackSlot,
}

impl FrameProcessor {
    fn process(&mut self, interleaved: &[f32]) {
        let mono = downmix(interleaved, self.channels);
        let slot = &self.slot;
        match self.resampler.as_mut() {
            Some(resampler) => resampler.push(&mono, |frame| deliver(slot, frame)),
            None => deliver(slot, &mono),
        }
    }
}

fn deliver(slot: &CallbackSlot, frame: &[f32]) {
    if let Ok(mut slot) = slot.lock() {
        if let Some(on_frame) = slot.as_mut() {
            on_frame(frame);
        }
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Streaming wrapper over a fixed-input FFT resampler.
struct StreamResampler {
    inner: FftFixedIn<f32>,
    block: usize,
    pending: Vec<f32>,
}

impl StreamResampler {
    fn new(from_rate: u32, to_rate: u32) -> Result<Self, AudioError> {
        let inner = FftFixedIn::<f32>::new(
            from_rate as usize,
            to_rate as usize,
            RESAMPLE_CHUNK,
            2, // sub-chunks for quality
            1, // mono
        )
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;
        // The FFT size may round the requested block up.
        let block = inner.input_frames_next();
        Ok(Self {
            inner,
            block,
            pending: Vec::with_capacity(block * 2),
        })
    }

    /// Buffer `mono` and emit every fully resampled block.
    fn push(&mut self, mono: &[f32], mut emit: impl FnMut(&[f32])) {
        self.pending.extend_from_slice(mono);
        while self.pending.len() >= self.block {
            match self.inner.process(&[&self.pending[..self.block]], None) {
                Ok(out) => {
                    if let Some(channel) = out.first() {
                        emit(channel);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Dropping capture block after resample failure"),
            }
            self.pending.drain(..self.block);
        }
    }
}
