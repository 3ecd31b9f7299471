//! Remote perception and speech services
//!
//! The detector, the captioner and the speech synthesizer are plain HTTP
//! endpoints; a vision model can optionally produce richer room
//! descriptions. The traits here are what the orchestrator depends on,
//! so tests and other backends can stand in for the HTTP client.

mod http;
mod vision;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub use http::HttpPerceptionClient;
pub use vision::{DEFAULT_VISION_URL, ROOM_PROMPT, VisionDescriber};

use crate::detection::{Detection, DetectionSet};
use crate::{Error, Result};

/// Object detector and scene captioner
#[async_trait]
pub trait DetectionTransport: Send + Sync {
    /// Detect objects in an encoded frame
    async fn detect(&self, image: &[u8]) -> Result<DetectionSet>;

    /// Natural-language caption of an encoded frame
    async fn describe_scene(&self, image: &[u8]) -> Result<String>;
}

/// Text-to-speech service
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// Synthesize `text` into WAV bytes (PCM16 LE mono, 44-byte header)
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Preferred, richer describer whose transport failures fall back to the
/// captioner
#[async_trait]
pub trait StructuredDescriber: Send + Sync {
    async fn describe(&self, image: &[u8]) -> Result<String>;
}

/// Run a remote call with a deadline
///
/// # Errors
///
/// Returns `Error::Timeout` if `call` does not finish within `limit`, or
/// whatever error the call itself produced
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

/// Detector response: either a bare array or wrapped in `detections`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DetectionResponse {
    List(Vec<Detection>),
    Wrapped { detections: Option<Vec<Detection>> },
}

/// Captioner response
#[derive(Debug, Deserialize)]
struct CaptionResponse {
    description: Option<String>,
}

/// Parse a detector response body
///
/// # Errors
///
/// Returns `Error::Parse` if the body matches neither accepted shape
pub fn parse_detections(body: &str) -> Result<DetectionSet> {
    let response: DetectionResponse = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("detector response: {e}")))?;

    let detections = match response {
        DetectionResponse::List(list) => list,
        DetectionResponse::Wrapped { detections } => detections.unwrap_or_default(),
    };

    Ok(DetectionSet::new(detections))
}

/// Parse a captioner response body
///
/// # Errors
///
/// Returns `Error::Parse` if the body is malformed or the description is
/// missing or blank
pub fn parse_caption(body: &str) -> Result<String> {
    let response: CaptionResponse = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("caption response: {e}")))?;

    response
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| Error::Parse("caption response has no description".to_string()))
}
