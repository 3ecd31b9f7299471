//! Vision model client for room descriptions
//!
//! Uses a Gemini-style `generateContent` endpoint with the frame inlined as
//! base64 PNG.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::StructuredDescriber;
use crate::{Error, Result};

pub const DEFAULT_VISION_URL: &str =
    "https://generativelanguage.googleapis.com/v1/models/gemini-1.5-pro:generateContent";

/// Instruction sent alongside the frame
pub const ROOM_PROMPT: &str = "Describe this room for a visually impaired user.";

/// Vision client for room descriptions
pub struct VisionDescriber {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
}

/// `generateContent` request
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

/// A request part (text or inline image)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

/// `generateContent` response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl VisionDescriber {
    /// Create a new vision client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "vision API key required for room descriptions".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            url: DEFAULT_VISION_URL.to_string(),
        })
    }

    /// Use a different `generateContent` endpoint
    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }
}

#[async_trait]
impl StructuredDescriber for VisionDescriber {
    async fn describe(&self, image: &[u8]) -> Result<String> {
        let base64_data = base64::engine::general_purpose::STANDARD.encode(image);
        tracing::debug!(base64_len = base64_data.len(), "sending frame to vision model");

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: ROOM_PROMPT },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: base64_data,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("vision request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("vision API error {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("vision response failed: {e}")))?;

        parse_generate_response(&body)
    }
}

/// Extract the first candidate's first text part
fn parse_generate_response(body: &str) -> Result<String> {
    let result: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("vision response: {e}")))?;

    let description = result
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Parse("empty response from vision API".to_string()))?;

    tracing::debug!(description = %description, "room described");
    Ok(description)
}
