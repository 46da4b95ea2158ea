//! Pipeline error taxonomy and its HTTP mapping.
//!
//! Each pipeline stage returns its own category; the handler layer converts a
//! `ParseError` into a JSON `{error}` body via `IntoResponse`. Internal errors
//! are logged and never leak their underlying message to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// Client-supplied input was rejected before any storage write.
    #[error("{0}")]
    Validation(String),

    /// The document itself yielded no usable text (corrupt file, blank scan).
    #[error("{0}")]
    Extraction(String),

    /// The completion service call failed or its reply could not be parsed.
    #[error("{0}")]
    Service(String),

    /// Request body exceeded the transport-layer limit.
    #[error("File size exceeds 10MB limit")]
    PayloadTooLarge,

    /// Anything uncategorized. The cause is logged, not exposed.
    #[error("An unexpected error occurred while parsing the statement")]
    Internal(#[from] anyhow::Error),
}

impl ParseError {
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::Validation(_) | ParseError::Extraction(_) => StatusCode::BAD_REQUEST,
            ParseError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ParseError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ParseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ParseError {
    fn into_response(self) -> Response {
        if let ParseError::Internal(ref cause) = self {
            error!("Internal error while parsing statement: {:#}", cause);
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ParseError::Validation("No issuer specified".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ParseError::Extraction("No text could be extracted from the document".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ParseError::Service("timed out".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ParseError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ParseError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ParseError::Internal(anyhow::anyhow!("secret path /var/lib/x"));
        assert!(!err.to_string().contains("secret"));
    }
}
