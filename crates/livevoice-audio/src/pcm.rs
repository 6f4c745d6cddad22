//! PCM16 conversion and base64 transport encoding.
//!
//! Capture side: f32 in [−1, 1] → i16 (asymmetric scale so both rails are
//! reachable: negatives × 0x8000, positives × 0x7FFF) → LE bytes → base64.
//! Playback side: base64 → LE bytes → i16 → f32.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::AudioError;

/// Sample rate assumed for gateway audio without a `rate=` parameter.
pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Convert one float sample to PCM16, clamping to [−1, 1] first.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f32_to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32_768.0 } else { s * 32_767.0 };
    scaled.round() as i16
}

/// Convert a block of float samples to PCM16.
#[must_use]
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(f32_to_pcm16).collect()
}

/// Encode float samples as base64 PCM16 LE.
#[must_use]
pub fn encode_base64(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in to_pcm16(samples) {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    BASE64.encode(bytes)
}

/// Decode base64 PCM16 LE into float samples.
pub fn decode_base64(payload: &str) -> Result<Vec<f32>, AudioError> {
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| AudioError::Decode(e.to_string()))?;
    if bytes.len() % 2 != 0 {
        return Err(AudioError::Decode(format!(
            "odd PCM16 byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
        .collect())
}

/// Resolve the sample rate of a PCM mime type such as `audio/pcm;rate=24000`.
///
/// A missing mime type means PCM at [`DEFAULT_PLAYBACK_SAMPLE_RATE`]. Any
/// non-PCM media type is rejected, since compressed codecs are not decoded.
pub fn pcm_sample_rate(mime_type: Option<&str>) -> Result<u32, AudioError> {
    let Some(mime) = mime_type else {
        return Ok(DEFAULT_PLAYBACK_SAMPLE_RATE);
    };

    let mut parts = mime.split(';').map(str::trim);
    let essence = parts.next().unwrap_or_default().to_ascii_lowercase();
    if essence != "audio/pcm" && essence != "audio/l16" {
        return Err(AudioError::UnsupportedFormat(mime.to_string()));
    }

    for param in parts {
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("rate") {
                return value
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|rate| *rate > 0)
                    .ok_or_else(|| AudioError::UnsupportedFormat(mime.to_string()));
            }
        }
    }
    Ok(DEFAULT_PLAYBACK_SAMPLE_RATE)
}
