//! Text extraction adapter: PDF text layer or image OCR, by [`DocumentKind`].
//!
//! Engine faults are wrapped as extraction-category errors that name the
//! stage; raw lopdf or OCR errors never escape this layer. Whether an empty
//! result is acceptable is the orchestrator's call, not ours.

use crate::error::ParseError;
use crate::ocr::OcrEngine;
use crate::upload::{DocumentKind, StoredUpload};
use anyhow::{Context, Result};
use lopdf::Document;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Extract raw text from a stored upload.
    pub async fn extract(
        &self,
        upload: &StoredUpload,
        kind: DocumentKind,
    ) -> Result<String, ParseError> {
        match kind {
            DocumentKind::Pdf => pdf_text(upload.path()).map_err(|e| {
                ParseError::Extraction(format!("Failed to extract text from PDF: {e:#}"))
            }),
            DocumentKind::Image(format) => {
                let data = std::fs::read(upload.path()).map_err(|e| {
                    ParseError::Extraction(format!("Failed to read image for OCR: {e}"))
                })?;
                self.ocr.recognize(format.mime(), &data).await.map_err(|e| {
                    ParseError::Extraction(format!("Failed to extract text from image: {e:#}"))
                })
            }
        }
    }
}

/// Extract the text layer of a PDF, page by page.
fn pdf_text(path: &Path) -> Result<String> {
    let doc = Document::load(path).context("Failed to load PDF")?;

    let mut pages = Vec::new();
    for (page_num, _) in doc.get_pages() {
        // A page without an extractable text layer is skipped, not fatal.
        match doc.extract_text(&[page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => debug!("Skipping page {}: {}", page_num, e),
        }
    }

    Ok(join_pages(&pages))
}

/// Join non-blank page texts with newlines; blank pages are dropped.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::validate_and_store;
    use std::path::PathBuf;
    use uuid::Uuid;

    struct FixedOcr(&'static str);

    #[async_trait::async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _mime: &str, _data: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    #[async_trait::async_trait]
    impl OcrEngine for FailingOcr {
        async fn recognize(&self, _mime: &str, _data: &[u8]) -> Result<String> {
            anyhow::bail!("unreadable image")
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("statement-parser-test-{}", Uuid::new_v4().simple()))
    }

    #[test]
    fn test_join_pages_skips_blanks() {
        let pages = vec![
            "Page one text".to_string(),
            "   \n\t".to_string(),
            String::new(),
            "Page four text".to_string(),
        ];
        assert_eq!(join_pages(&pages), "Page one text\nPage four text");
    }

    #[test]
    fn test_join_pages_all_blank_is_empty() {
        let pages = vec!["  ".to_string(), "\n".to_string()];
        assert_eq!(join_pages(&pages), "");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_extraction_error() {
        let dir = scratch_dir();
        let (upload, kind) =
            validate_and_store(&dir, "broken.pdf", b"this is not a pdf at all").unwrap();

        let extractor = TextExtractor::new(Arc::new(FixedOcr("unused")));
        let result = extractor.extract(&upload, kind).await;
        match result {
            Err(ParseError::Extraction(msg)) => {
                assert!(msg.starts_with("Failed to extract text from PDF"), "{msg}");
            }
            other => panic!("expected extraction error, got {other:?}"),
        }

        drop(upload);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_image_path_uses_ocr_engine() {
        let dir = scratch_dir();
        let (upload, kind) = validate_and_store(&dir, "scan.png", b"\x89PNG\r\n").unwrap();

        let extractor = TextExtractor::new(Arc::new(FixedOcr("Statement balance $12.34")));
        let text = extractor.extract(&upload, kind).await.unwrap();
        assert_eq!(text, "Statement balance $12.34");

        drop(upload);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_ocr_fault_is_wrapped_with_stage() {
        let dir = scratch_dir();
        let (upload, kind) = validate_and_store(&dir, "scan.jpg", b"\xff\xd8\xff").unwrap();

        let extractor = TextExtractor::new(Arc::new(FailingOcr));
        let result = extractor.extract(&upload, kind).await;
        match result {
            Err(ParseError::Extraction(msg)) => {
                assert!(msg.starts_with("Failed to extract text from image"), "{msg}");
                assert!(msg.contains("unreadable image"), "{msg}");
            }
            other => panic!("expected extraction error, got {other:?}"),
        }

        drop(upload);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
