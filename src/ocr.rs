//! OCR engine abstraction for image uploads.
//!
//! Defines the [`OcrEngine`] trait so the extraction adapter never depends on
//! a concrete engine; the production implementation sends the image inline to
//! the Gemini multimodal endpoint with a fixed transcription instruction.

use crate::gemini::GenerativeModel;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

const TRANSCRIBE_PROMPT: &str = "Transcribe all text visible in this image exactly as it appears. \
Preserve line breaks and ordering. Return only the transcribed text, with no commentary.";

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    /// Run a single OCR pass over one whole image.
    async fn recognize(&self, mime: &str, data: &[u8]) -> Result<String>;
}

/// OCR backed by the Gemini vision endpoint.
pub struct GeminiOcr {
    model: Arc<dyn GenerativeModel>,
}

impl GeminiOcr {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }
}

#[async_trait::async_trait]
impl OcrEngine for GeminiOcr {
    async fn recognize(&self, mime: &str, data: &[u8]) -> Result<String> {
        info!("Running OCR pass over {} image ({} bytes)", mime, data.len());
        self.model
            .generate_with_image(TRANSCRIBE_PROMPT, mime, data)
            .await
    }
}
