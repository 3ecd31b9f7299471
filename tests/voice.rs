//! Voice pipeline integration tests
//!
//! Tests speech decoding and rendering without requiring audio hardware

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use guidepost::geometry::{CameraPose, Vec3};
use guidepost::transport::SpeechTransport;
use guidepost::voice::{
    AudioClip, PlaybackParams, Speaker, WAV_HEADER_LEN, beep, decode_pcm16, render,
};
use guidepost::{Error, Result};

mod common;

use common::{RecordingAudio, RecordingSpeech, TIMEOUT};

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss)]
fn generate_sine_samples(rate: u32, frequency: f32, count: usize, amplitude: f32) -> Vec<f32> {
    (0..count)
        .map(|i| {
            let t = i as f32 / rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Encode PCM16 mono the way the speech server does
#[allow(clippy::cast_possible_truncation)]
fn pcm16_wav(samples: &[f32], rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

struct SlowSpeech;

#[async_trait]
impl SpeechTransport for SlowSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

struct BrokenSpeech;

#[async_trait]
impl SpeechTransport for BrokenSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(b"RIFF".to_vec())
    }
}

#[test]
fn test_decode_server_wav() {
    let samples = generate_sine_samples(22_050, 440.0, 1000, 0.8);
    let wav = pcm16_wav(&samples, 22_050);
    assert_eq!(wav.len(), WAV_HEADER_LEN + 2 * samples.len());

    let clip = decode_pcm16(&wav).unwrap();
    assert_eq!(clip.sample_rate, 22_050);
    assert_eq!(clip.samples.len(), 1000);
    assert!(clip.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    for (decoded, original) in clip.samples.iter().zip(&samples) {
        assert!((decoded - original).abs() < 1e-3);
    }
}

#[test]
fn test_beep_renders_louder_on_its_side() {
    let pose = CameraPose::looking_forward(Vec3::new(0.0, 1.6, 0.0), 60.0, 16.0 / 9.0);
    let clip = beep::synthesize_beep();

    let frames = render(
        &clip,
        PlaybackParams::spatial(1.0, 1.0, Vec3::new(-1.0, 1.6, 1.0)),
        clip.sample_rate,
        2,
        Some(&pose),
    )
    .unwrap();

    let (left, right) = frames
        .chunks(2)
        .fold((0.0_f32, 0.0_f32), |(l, r), f| (l + f[0].abs(), r + f[1].abs()));
    assert!(left > right * 2.0, "left {left} right {right}");
}

#[tokio::test]
async fn test_speaker_plays_decoded_speech() {
    let speech = Arc::new(RecordingSpeech::default());
    let audio = Arc::new(RecordingAudio::default());
    let speaker = Speaker::new(speech.clone(), audio.clone(), TIMEOUT);

    speaker.speak("  You're close  ").await.unwrap();
    assert_eq!(speech.spoken(), vec!["You're close"]);
    // Speech is not spatialized
    assert_eq!(audio.beep_count(), 0);
}

#[tokio::test]
async fn test_speaker_skips_blank_text() {
    let speech = Arc::new(RecordingSpeech::default());
    let speaker = Speaker::new(speech.clone(), Arc::new(RecordingAudio::default()), TIMEOUT);

    speaker.speak("   ").await.unwrap();
    assert!(speech.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_speaker_times_out() {
    let speaker = Speaker::new(
        Arc::new(SlowSpeech),
        Arc::new(RecordingAudio::default()),
        TIMEOUT,
    );

    let result = speaker.speak("Move left").await;
    assert!(matches!(result, Err(Error::Timeout(limit)) if limit == TIMEOUT));
}

#[tokio::test]
async fn test_speaker_rejects_truncated_audio() {
    let speaker = Speaker::new(
        Arc::new(BrokenSpeech),
        Arc::new(RecordingAudio::default()),
        TIMEOUT,
    );

    assert!(matches!(speaker.speak("Move up").await, Err(Error::Parse(_))));
}

#[test]
fn test_empty_clip_is_silent() {
    let clip = AudioClip::new(Vec::new(), 24_000);
    assert!(clip.is_empty());
    assert_eq!(clip.duration(), Duration::ZERO);
}
