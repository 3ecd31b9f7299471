//! Spoken output: text → TTS server → WAV → speakers

use std::sync::Arc;
use std::time::Duration;

use super::playback::{AudioSink, PlaybackParams};
use super::wav::decode_pcm16;
use crate::Result;
use crate::transport::{SpeechTransport, with_timeout};

/// Routes every spoken sentence through the single speech transport
#[derive(Clone)]
pub struct Speaker {
    speech: Arc<dyn SpeechTransport>,
    audio: Arc<dyn AudioSink>,
    timeout: Duration,
}

impl Speaker {
    #[must_use]
    pub fn new(
        speech: Arc<dyn SpeechTransport>,
        audio: Arc<dyn AudioSink>,
        timeout: Duration,
    ) -> Self {
        Self {
            speech,
            audio,
            timeout,
        }
    }

    /// Synthesize `text` and start playing it
    ///
    /// Returns once playback has started, not when it ends.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails, times out, or returns audio that
    /// cannot be decoded
    pub async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        tracing::info!(text, "speaking");
        let wav = with_timeout(self.timeout, self.speech.synthesize(text)).await?;
        let clip = decode_pcm16(&wav)?;

        tracing::debug!(
            samples = clip.samples.len(),
            rate = clip.sample_rate,
            seconds = clip.duration().as_secs_f32(),
            "playing speech"
        );
        self.audio.play(&clip, PlaybackParams::flat())
    }

    /// Speak without waiting; failures are logged
    pub fn say(&self, text: impl Into<String>) {
        let speaker = self.clone();
        let text = text.into();
        tokio::spawn(async move {
            if let Err(e) = speaker.speak(&text).await {
                tracing::warn!(error = %e, text = %text, "speech failed");
            }
        });
    }
}
