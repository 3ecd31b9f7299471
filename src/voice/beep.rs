//! The guidance beep clip

use std::path::Path;

use super::wav::AudioClip;
use crate::{Error, Result};

/// Sample rate of the synthesized beep
pub const BEEP_SAMPLE_RATE: u32 = 24000;

const BEEP_FREQUENCY: f32 = 880.0;
const BEEP_DURATION_MS: u32 = 120;
const BEEP_AMPLITUDE: f32 = 0.6;
const FADE_MS: u32 = 10;

/// Synthesize a short sine beep with linear fades to avoid clicks
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn synthesize_beep() -> AudioClip {
    let rate = BEEP_SAMPLE_RATE as f32;
    let total = (BEEP_SAMPLE_RATE * BEEP_DURATION_MS / 1000) as usize;
    let fade = (BEEP_SAMPLE_RATE * FADE_MS / 1000) as usize;

    let samples = (0..total)
        .map(|i| {
            let t = i as f32 / rate;
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i + fade > total {
                (total - i) as f32 / fade as f32
            } else {
                1.0
            };
            BEEP_AMPLITUDE * envelope * (2.0 * std::f32::consts::PI * BEEP_FREQUENCY * t).sin()
        })
        .collect();

    AudioClip::new(samples, BEEP_SAMPLE_RATE)
}

/// Load a beep from a WAV file, mixing any extra channels down to mono
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
#[allow(clippy::cast_precision_loss)]
pub fn load_beep(path: &Path) -> Result<AudioClip> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| Error::Audio(format!("failed to open {}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    tracing::debug!(path = %path.display(), rate = spec.sample_rate, "loaded beep clip");
    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// Beep from `path` if given and readable, otherwise the synthesized tone
#[must_use]
pub fn beep_or_default(path: Option<&Path>) -> AudioClip {
    match path {
        Some(path) => load_beep(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to synthesized beep");
            synthesize_beep()
        }),
        None => synthesize_beep(),
    }
}
