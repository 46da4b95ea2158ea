//! Statement parsing pipeline.
//!
//! [`StatementParser`] sequences extraction, prompt construction, the model
//! call, and reply parsing. It takes the [`StoredUpload`] by value, so the
//! stored file is removed when the call returns, on success and on every
//! failure path after storage.

use crate::error::ParseError;
use crate::extract::TextExtractor;
use crate::gemini::GenerativeModel;
use crate::upload::{DocumentKind, StoredUpload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Placeholder for fields the model cannot determine.
pub const SENTINEL: &str = "N/A";

/// Cap on statement text embedded in the prompt, so very large documents
/// stay under the completion service's input limits.
const MAX_STATEMENT_CHARS: usize = 60_000;

/// The five fixed fields pulled from a statement. Keys the model omits
/// default to the sentinel; unknown keys in the reply are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoints {
    #[serde(default = "sentinel")]
    pub card_last_4: String,
    #[serde(default = "sentinel")]
    pub billing_cycle: String,
    #[serde(default = "sentinel")]
    pub payment_due_date: String,
    #[serde(default = "sentinel")]
    pub total_balance: String,
    #[serde(default = "sentinel")]
    pub card_variant: String,
}

fn sentinel() -> String {
    SENTINEL.to_string()
}

/// Success payload of the pipeline, serialized directly as the response body.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedStatement {
    pub issuer: String,
    pub data_points: DataPoints,
}

pub struct StatementParser {
    extractor: TextExtractor,
    model: Arc<dyn GenerativeModel>,
}

impl StatementParser {
    pub fn new(extractor: TextExtractor, model: Arc<dyn GenerativeModel>) -> Self {
        Self { extractor, model }
    }

    /// Run the full pipeline over one stored upload.
    pub async fn parse(
        &self,
        upload: StoredUpload,
        kind: DocumentKind,
        issuer: &str,
    ) -> Result<ParsedStatement, ParseError> {
        let text = self.extractor.extract(&upload, kind).await?;
        if text.trim().is_empty() {
            return Err(ParseError::Extraction(
                "No text could be extracted from the document".to_string(),
            ));
        }
        info!("Extracted {} chars of statement text", text.len());

        let prompt = build_extraction_prompt(&text, issuer);
        let reply = self.model.generate(&prompt).await.map_err(|e| {
            ParseError::Service(format!("Failed to extract data using the model: {e:#}"))
        })?;
        debug!("Model reply: {} chars", reply.len());

        let data_points = parse_model_reply(&reply)?;
        Ok(ParsedStatement {
            issuer: issuer.to_string(),
            data_points,
        })
    }
}

/// Render the fixed extraction instruction for one statement.
fn build_extraction_prompt(text: &str, issuer: &str) -> String {
    format!(
        r#"You are an expert at extracting information from credit card statements.

Please extract the following 5 key data points from this {issuer} credit card statement:
1. Card Last 4 Digits (the last 4 digits of the card number)
2. Billing Cycle (the date range of the billing period)
3. Payment Due Date (the date payment is due)
4. Total Balance (the total amount owed)
5. Card Variant/Type (the specific card product name/type)

Statement Text:
{statement}

Please respond in this exact JSON format:
{{
    "card_last_4": "value or N/A",
    "billing_cycle": "value or N/A",
    "payment_due_date": "value or N/A",
    "total_balance": "value or N/A",
    "card_variant": "value or N/A"
}}

Only return the JSON, no other text."#,
        issuer = issuer,
        statement = truncate_for_context(text, MAX_STATEMENT_CHARS),
    )
}

fn truncate_for_context(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        text
    } else {
        let mut end = max_chars;
        while !text.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        &text[..end]
    }
}

/// Pull the five fields out of a free-form model reply.
///
/// The candidate payload is the substring between the first `{` and the last
/// `}`; surrounding prose is ignored. Missing keys resolve to the sentinel.
fn parse_model_reply(reply: &str) -> Result<DataPoints, ParseError> {
    let (start, end) = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(ParseError::Service(
                "No JSON found in model reply".to_string(),
            ))
        }
    };

    serde_json::from_str(&reply[start..=end])
        .map_err(|e| ParseError::Service(format!("Failed to parse model reply: {e}")))
}
