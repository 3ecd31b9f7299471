//! HTTP client for the detector, captioner and speech server

use async_trait::async_trait;

use super::{DetectionTransport, SpeechTransport, parse_caption, parse_detections};
use crate::detection::DetectionSet;
use crate::{Error, Result};

/// Talks to the perception server (`/describe_image`, `/text_to_speech`)
/// and the detector (`/detect`)
///
/// The two base URLs are independent because the detector usually runs on
/// its own GPU host.
#[derive(Debug, Clone)]
pub struct HttpPerceptionClient {
    client: reqwest::Client,
    server_url: Option<String>,
    detector_url: Option<String>,
}

impl HttpPerceptionClient {
    /// Create a client; either URL may be missing, in which case calls that
    /// need it fail with a configuration error
    #[must_use]
    pub fn new(server_url: Option<String>, detector_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.map(|u| u.trim_end_matches('/').to_string()),
            detector_url: detector_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn server_endpoint(&self, path: &str) -> Result<String> {
        self.server_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("{u}{path}"))
            .ok_or_else(|| Error::Config("captioning/TTS server URL is empty".to_string()))
    }

    fn detector_endpoint(&self) -> Result<String> {
        self.detector_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("{u}/detect"))
            .ok_or_else(|| Error::Config("detector URL is empty".to_string()))
    }

    /// POST raw image bytes and return the response body as text
    async fn post_image(&self, url: &str, image: &[u8]) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("{url} returned {status}: {body}")));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl DetectionTransport for HttpPerceptionClient {
    async fn detect(&self, image: &[u8]) -> Result<DetectionSet> {
        let url = self.detector_endpoint()?;
        tracing::debug!(url = %url, bytes = image.len(), "sending frame to detector");

        let body = self.post_image(&url, image).await?;
        tracing::trace!(body = %body, "detector response");

        parse_detections(&body)
    }

    async fn describe_scene(&self, image: &[u8]) -> Result<String> {
        let url = self.server_endpoint("/describe_image")?;
        tracing::debug!(url = %url, bytes = image.len(), "sending frame for captioning");

        let body = self.post_image(&url, image).await?;
        tracing::trace!(body = %body, "captioning response");

        parse_caption(&body)
    }
}

#[async_trait]
impl SpeechTransport for HttpPerceptionClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            text: &'a str,
        }

        let url = self.server_endpoint("/text_to_speech")?;
        tracing::debug!(url = %url, text, "sending text for TTS");

        let response = self
            .client
            .post(&url)
            .json(&TtsRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
