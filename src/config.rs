//! Environment-driven application configuration.
//!
//! All knobs come from env vars (a `.env` file is loaded at startup if
//! present). The per-file 10 MiB ceiling is a fixed constant enforced by the
//! upload validator; `max_body_size` is the transport-layer ceiling and sits
//! above it so multipart framing overhead never masks the 400-class rejection.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Hard ceiling on a single uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_BODY_SIZE: usize = 12 * 1024 * 1024;
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub upload_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub max_body_size: usize,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;

        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => default_cors_origins(),
        };

        let max_body_size = match env::var("MAX_BODY_SIZE") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid MAX_BODY_SIZE: {raw}"))?,
            Err(_) => DEFAULT_MAX_BODY_SIZE,
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().with_context(|| format!("Invalid PORT: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            gemini_api_key,
            gemini_model,
            upload_dir,
            cors_origins,
            max_body_size,
            port,
        })
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5000".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5000".to_string(),
    ]
}
