//! Gemini API client for LLM completions.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Bounded wait on the outbound completion call. A timeout surfaces as a
/// request error and is mapped to a service failure by the caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Seam over the completion service so the pipeline can run against doubles.
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Text-only completion.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Completion over a prompt plus one inline image.
    async fn generate_with_image(&self, prompt: &str, mime: &str, data: &[u8]) -> Result<String>;
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn send_request(&self, parts: Vec<Part>) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        debug!("Sending request to Gemini: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        let response: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        info!("Gemini response: {} chars", text.len());
        Ok(text)
    }
}

#[async_trait::async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.send_request(vec![Part::text(prompt)]).await
    }

    async fn generate_with_image(&self, prompt: &str, mime: &str, data: &[u8]) -> Result<String> {
        self.send_request(vec![Part::text(prompt), Part::inline_image(mime, data)])
            .await
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: Blob },
}

#[derive(Debug, Serialize)]
struct Blob {
    mime_type: String,
    data: String,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    fn inline_image(mime: &str, data: &[u8]) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: mime.to_string(),
                data: BASE64.encode(data),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part_shape() {
        let json = serde_json::to_value(Part::text("hello")).unwrap();
        assert_eq!(json, serde_json::json!({ "text": "hello" }));
    }

    #[test]
    fn test_inline_image_part_shape() {
        let json = serde_json::to_value(Part::inline_image("image/png", &[1, 2, 3])).unwrap();
        assert_eq!(json["inline_data"]["mime_type"], "image/png");
        assert_eq!(json["inline_data"]["data"], "AQID");
    }

    #[test]
    fn test_response_text_extraction_shape() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":1}"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let text = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
            .unwrap_or_default();
        assert_eq!(text, "{\"a\":1}");
    }
}
