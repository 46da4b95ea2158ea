//! Credit Card Statement Parser - HTTP server.
//!
//! Accepts an uploaded statement (PDF or image), extracts its text, and asks
//! a Gemini model for five structured fields. See `parser` for the pipeline.

mod config;
mod error;
mod extract;
mod gemini;
mod ocr;
mod parser;
mod upload;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use config::AppConfig;
use error::ParseError;
use extract::TextExtractor;
use gemini::{GeminiClient, GenerativeModel};
use ocr::GeminiOcr;
use parser::{ParsedStatement, StatementParser};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
    parser: Arc<StatementParser>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statement_parser=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    std::fs::create_dir_all(&config.upload_dir)?;
    info!("Uploads stored under {:?}", config.upload_dir);

    // Initialize Gemini client; the same client serves completions and OCR
    let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())?;
    let model: Arc<dyn GenerativeModel> = Arc::new(gemini);
    info!("Gemini client initialized (model: {})", config.gemini_model);

    let extractor = TextExtractor::new(Arc::new(GeminiOcr::new(model.clone())));
    let parser = StatementParser::new(extractor, model);

    let state = AppState {
        config: Arc::new(config.clone()),
        parser: Arc::new(parser),
    };

    // CORS restricted to the configured origins
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/issuers", get(issuers))
        .route("/parse", post(parse_statement))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Run server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Credit Card Statement Parser API is running"
    }))
}

/// A supported credit card issuer.
#[derive(serde::Serialize)]
struct Issuer {
    id: &'static str,
    name: &'static str,
    logo: &'static str,
    description: &'static str,
}

/// Return the fixed list of supported credit card issuers.
async fn issuers() -> Json<Vec<Issuer>> {
    Json(vec![
        Issuer {
            id: "chase",
            name: "Chase",
            logo: "🏦",
            description: "Chase Bank credit cards",
        },
        Issuer {
            id: "amex",
            name: "American Express",
            logo: "💳",
            description: "American Express cards",
        },
        Issuer {
            id: "capital_one",
            name: "Capital One",
            logo: "🏛️",
            description: "Capital One credit cards",
        },
        Issuer {
            id: "discover",
            name: "Discover",
            logo: "🔍",
            description: "Discover card statements",
        },
        Issuer {
            id: "citi",
            name: "Citibank",
            logo: "🌍",
            description: "Citibank credit cards",
        },
    ])
}

/// Parse a credit card statement from an uploaded PDF or image.
async fn parse_statement(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ParsedStatement>, ParseError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut issuer: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(map_multipart_error)?;
                file = Some((filename, data.to_vec()));
            }
            Some("issuer") => {
                issuer = Some(field.text().await.map_err(map_multipart_error)?);
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ParseError::Validation("No file provided".to_string()))?;
    let issuer = issuer
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ParseError::Validation("No issuer specified".to_string()))?;

    info!(
        "Received file: {} ({} bytes) for issuer: {}",
        filename,
        data.len(),
        issuer
    );

    let (upload, kind) = upload::validate_and_store(&state.config.upload_dir, &filename, &data)?;
    let parsed = state.parser.parse(upload, kind, &issuer).await?;

    info!("Parse complete for issuer: {}", parsed.issuer);
    Ok(Json(parsed))
}

/// Fallback for unknown routes.
async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

// ============================================================================
// Helper functions
// ============================================================================

/// Map a multipart read failure, keeping the transport-layer 413 distinct
/// from ordinary malformed-body 400s.
fn map_multipart_error(e: MultipartError) -> ParseError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ParseError::PayloadTooLarge
    } else {
        ParseError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}
