//! Audio playback to speakers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::wav::AudioClip;
use crate::geometry::{CameraPose, Vec3, clamp01};
use crate::sensors::CameraRig;
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Spatial sources are at full volume inside this radius
const ROLLOFF_MIN_DISTANCE: f32 = 0.5;

/// Spatial sources are silent beyond this radius
const ROLLOFF_MAX_DISTANCE: f32 = 6.0;

/// How a clip should be rendered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    /// Playback rate multiplier; 2.0 plays an octave higher and twice as fast
    pub pitch: f32,
    /// Linear gain in `[0, 1]`
    pub volume: f32,
    /// World position of the source; `None` plays centered with no rolloff
    pub position: Option<Vec3>,
}

impl PlaybackParams {
    /// Unpitched, full volume, not spatialized (speech)
    #[must_use]
    pub const fn flat() -> Self {
        Self {
            pitch: 1.0,
            volume: 1.0,
            position: None,
        }
    }

    /// Source anchored at a world position
    #[must_use]
    pub const fn spatial(pitch: f32, volume: f32, position: Vec3) -> Self {
        Self {
            pitch,
            volume,
            position: Some(position),
        }
    }
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self::flat()
    }
}

/// Output device abstraction used by the guidance loop and the speaker
pub trait AudioSink: Send + Sync {
    /// Start playing `clip` and return without waiting for it to finish
    ///
    /// # Errors
    ///
    /// Returns error if the clip cannot be rendered or the device refuses it
    fn play(&self, clip: &AudioClip, params: PlaybackParams) -> Result<()>;

    /// Cut off every clip that is currently playing
    fn stop(&self);
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    config: StreamConfig,
    /// Bumped by `stop()`; streams started under an older value go silent
    generation: Arc<AtomicU64>,
    listener: Option<Arc<dyn CameraRig>>,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: mono, no panning possible
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 1
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            generation: Arc::new(AtomicU64::new(0)),
            listener: None,
        })
    }

    /// Pan and attenuate spatial clips relative to this camera
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn CameraRig>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Play a clip and wait until it has finished or was stopped
    ///
    /// # Errors
    ///
    /// Returns error if rendering or playback fails
    pub async fn play_to_end(&self, clip: &AudioClip, params: PlaybackParams) -> Result<()> {
        let frames = self.render_for_device(clip, params)?;
        let config = self.config.clone();
        let generation = Arc::clone(&self.generation);
        let started_at = generation.load(Ordering::SeqCst);

        tokio::task::spawn_blocking(move || {
            play_frames_blocking(&config, &frames, &generation, started_at)
        })
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn render_for_device(&self, clip: &AudioClip, params: PlaybackParams) -> Result<Vec<f32>> {
        let pose = self.listener.as_ref().map(|l| l.camera_pose());
        render(
            clip,
            params,
            PLAYBACK_SAMPLE_RATE,
            usize::from(self.config.channels),
            pose.as_ref(),
        )
    }
}

impl AudioSink for AudioPlayback {
    fn play(&self, clip: &AudioClip, params: PlaybackParams) -> Result<()> {
        let frames = self.render_for_device(clip, params)?;
        if frames.is_empty() {
            return Ok(());
        }

        let config = self.config.clone();
        let generation = Arc::clone(&self.generation);
        let started_at = generation.load(Ordering::SeqCst);

        std::thread::Builder::new()
            .name("guidepost-playback".to_string())
            .spawn(move || {
                if let Err(e) = play_frames_blocking(&config, &frames, &generation, started_at) {
                    tracing::error!(error = %e, "audio playback error");
                }
            })
            .map_err(|e| Error::Audio(format!("failed to spawn playback thread: {e}")))?;

        Ok(())
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("playback stopped");
    }
}

/// Play interleaved frames in a blocking manner
fn play_frames_blocking(
    config: &StreamConfig,
    frames: &[f32],
    generation: &Arc<AtomicU64>,
    started_at: u64,
) -> Result<()> {
    if frames.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let samples: Arc<[f32]> = Arc::from(frames);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let samples_cb = Arc::clone(&samples);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);
    let generation_cb = Arc::clone(generation);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let stopped = generation_cb.load(Ordering::Relaxed) != started_at;
                let mut pos = position_cb.load(Ordering::Relaxed);

                for out in data.iter_mut() {
                    if stopped || pos >= samples_cb.len() {
                        *out = 0.0;
                        finished_cb.store(true, Ordering::Relaxed);
                    } else {
                        *out = samples_cb[pos];
                        pos += 1;
                    }
                }

                position_cb.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let channels = u64::from(config.channels.max(1));
    let duration_ms =
        (samples.len() as u64 * 1000) / (u64::from(config.sample_rate.0) * channels).max(1);

    // Poll for completion with timeout
    let start = Instant::now();
    let timeout = Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    tracing::trace!(samples = samples.len(), "playback complete");

    Ok(())
}

/// Render a clip into interleaved frames for a device
///
/// Pitch is applied by treating the clip as if it were recorded at
/// `sample_rate × pitch` and resampling to `device_rate`. Spatial clips get
/// linear distance rolloff and constant-power stereo panning relative to
/// `listener`; without a listener they are only pitched and scaled.
///
/// # Errors
///
/// Returns error if resampling fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render(
    clip: &AudioClip,
    params: PlaybackParams,
    device_rate: u32,
    channels: usize,
    listener: Option<&CameraPose>,
) -> Result<Vec<f32>> {
    if clip.is_empty() || clip.sample_rate == 0 {
        return Ok(Vec::new());
    }

    let pitch = if params.pitch.is_finite() && params.pitch > 0.0 {
        params.pitch
    } else {
        1.0
    };
    let source_rate = (clip.sample_rate as f32 * pitch).round().max(1.0) as u32;
    let mono = if source_rate == device_rate {
        clip.samples.clone()
    } else {
        resample(&clip.samples, source_rate, device_rate)?
    };

    let (left_gain, right_gain) = match (params.position, listener) {
        (Some(position), Some(pose)) => spatial_gains(position, pose),
        _ => (1.0, 1.0),
    };
    let volume = clamp01(params.volume);
    let channels = channels.max(1);

    let mut frames = Vec::with_capacity(mono.len() * channels);
    for sample in mono {
        let s = sample * volume;
        match channels {
            1 => frames.push(s * f32::midpoint(left_gain, right_gain)),
            n => {
                frames.push(s * left_gain);
                frames.push(s * right_gain);
                frames.extend(std::iter::repeat_n(0.0, n - 2));
            }
        }
    }

    Ok(frames)
}

/// Left/right gains for a source at `position` heard from `pose`
#[must_use]
pub fn spatial_gains(position: Vec3, pose: &CameraPose) -> (f32, f32) {
    let offset = position - pose.position;
    let distance = offset.length();

    let attenuation = 1.0
        - clamp01((distance - ROLLOFF_MIN_DISTANCE) / (ROLLOFF_MAX_DISTANCE - ROLLOFF_MIN_DISTANCE));

    let right = pose.up.cross(pose.forward).normalized();
    let pan = if distance <= f32::EPSILON {
        0.0
    } else {
        (offset.dot(right) / distance).clamp(-1.0, 1.0)
    };

    let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
    (angle.cos() * attenuation, angle.sin() * attenuation)
}

/// Resample a whole clip using rubato
///
/// The tail is flushed through the interpolator and its delay trimmed, so
/// the output always holds `len × to / from` samples, even for clips
/// shorter than one chunk.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FastFixedIn, PolynomialDegree, Resampler};

    const CHUNK_SIZE: usize = 1024;

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_SIZE, 1)
        .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + resampler.output_frames_max());

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in chunks.by_ref() {
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let result = resampler
            .process_partial(Some(&[remainder][..]), None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    // Push the delayed frames out
    while output.len() < expected + delay {
        let result = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| Error::Audio(format!("resample flush failed: {e}")))?;
        if result[0].is_empty() {
            break;
        }
        output.extend_from_slice(&result[0]);
    }

    let mut output = output.split_off(delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::feedback_for;
    use crate::voice::beep::synthesize_beep;

    fn listener() -> CameraPose {
        CameraPose::looking_forward(Vec3::new(0.0, 1.6, 0.0), 60.0, 16.0 / 9.0)
    }

    #[test]
    fn test_flat_render_is_centered_and_scaled() {
        let clip = AudioClip::new(vec![0.5; 10], PLAYBACK_SAMPLE_RATE);
        let params = PlaybackParams {
            volume: 0.5,
            ..PlaybackParams::flat()
        };

        let frames = render(&clip, params, PLAYBACK_SAMPLE_RATE, 2, None).unwrap();
        assert_eq!(frames.len(), 20);
        assert!(frames.iter().all(|s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_higher_pitch_shortens_clip() {
        let clip = AudioClip::new(vec![0.1; 4800], PLAYBACK_SAMPLE_RATE);
        let normal = render(&clip, PlaybackParams::flat(), PLAYBACK_SAMPLE_RATE, 1, None).unwrap();
        let high = render(
            &clip,
            PlaybackParams {
                pitch: 2.0,
                ..PlaybackParams::flat()
            },
            PLAYBACK_SAMPLE_RATE,
            1,
            None,
        )
        .unwrap();

        assert_eq!(normal.len(), 4800);
        assert!(high.len() < normal.len());
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_beep_survives_every_guidance_pitch() {
        let clip = synthesize_beep();
        let rms = |s: &[f32]| (s.iter().map(|x| x * x).sum::<f32>() / s.len() as f32).sqrt();
        let reference = rms(&clip.samples);

        for d in [1.5, 1.2, 1.0, 0.8, 0.6, 0.4, 0.2, 0.05] {
            let pitch = feedback_for(d).pitch;
            let params = PlaybackParams {
                pitch,
                ..PlaybackParams::flat()
            };
            let frames = render(&clip, params, PLAYBACK_SAMPLE_RATE, 1, None).unwrap();

            let expected = (clip.samples.len() as f32 / pitch).ceil();
            assert!(
                (frames.len() as f32 - expected).abs() <= 2.0,
                "d={d} pitch={pitch} len={} expected={expected}",
                frames.len()
            );
            let energy = rms(&frames) / reference;
            assert!(energy > 0.8, "d={d} pitch={pitch} energy={energy}");
        }
    }

    #[test]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn test_resample_handles_coprime_rates() {
        let samples = vec![0.5_f32; 2880];
        let out = resample(&samples, 24_414, 24_000).unwrap();
        assert_eq!(out.len(), (2880.0_f64 * 24_000.0 / 24_414.0).ceil() as usize);
        // Away from the edges a constant stays constant
        assert!(out[100..out.len() - 100].iter().all(|s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_source_to_the_right_pans_right() {
        let (left, right) = spatial_gains(Vec3::new(1.0, 1.6, 0.0), &listener());
        assert!(right > left);
        assert!(left.abs() < 1e-4);
    }

    #[test]
    fn test_source_ahead_is_balanced() {
        let (left, right) = spatial_gains(Vec3::new(0.0, 1.6, 0.4), &listener());
        assert!((left - right).abs() < 1e-4);
        assert!((left.hypot(right) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_distant_source_is_silent() {
        let (left, right) = spatial_gains(Vec3::new(0.0, 1.6, 10.0), &listener());
        assert!(left.abs() < 1e-6 && right.abs() < 1e-6);
    }

    #[test]
    fn test_empty_clip_renders_nothing() {
        let clip = AudioClip::new(Vec::new(), PLAYBACK_SAMPLE_RATE);
        assert!(render(&clip, PlaybackParams::flat(), PLAYBACK_SAMPLE_RATE, 2, None)
            .unwrap()
            .is_empty());
    }
}
