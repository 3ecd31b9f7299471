//! WAV encoding and decoding for synthesized speech

use std::time::Duration;

use crate::{Error, Result};

/// Size of the canonical RIFF/WAVE header emitted by the TTS server
pub const WAV_HEADER_LEN: usize = 44;

/// Byte offset of the little-endian sample rate inside the header
const SAMPLE_RATE_OFFSET: usize = 24;

/// Mono audio ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Samples normalized to `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Playback length at the clip's own sample rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode a mono PCM16 little-endian WAV with a fixed 44-byte header
///
/// The header is not validated beyond its length: the sample rate is read
/// from offset 24 and everything after byte 44 is treated as samples. A
/// trailing odd byte is ignored.
///
/// # Errors
///
/// Returns `Error::Parse` if the buffer is shorter than the header or
/// declares a zero sample rate
pub fn decode_pcm16(bytes: &[u8]) -> Result<AudioClip> {
    if bytes.len() < WAV_HEADER_LEN {
        return Err(Error::Parse(format!(
            "WAV buffer too short: {} bytes",
            bytes.len()
        )));
    }

    let rate_bytes: [u8; 4] = bytes[SAMPLE_RATE_OFFSET..SAMPLE_RATE_OFFSET + 4]
        .try_into()
        .map_err(|_| Error::Parse("WAV header truncated".to_string()))?;
    let sample_rate = u32::from_le_bytes(rate_bytes);
    if sample_rate == 0 {
        return Err(Error::Parse("WAV header declares 0 Hz".to_string()));
    }

    let samples = bytes[WAV_HEADER_LEN..]
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    Ok(AudioClip::new(samples, sample_rate))
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
