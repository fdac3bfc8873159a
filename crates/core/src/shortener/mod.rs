//! URL shortening for output links.
//!
//! Shortening is an optional, best-effort enrichment: callers bound every
//! call with a timeout and drop the short link on any failure.

mod tinyurl;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tinyurl::TinyUrlShortener;

/// Errors from a shortening service.
#[derive(Debug, Error)]
pub enum ShortenerError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("Shortener returned status {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Service answered with something that is not a URL.
    #[error("Shortener returned an invalid URL: {0:?}")]
    InvalidResponse(String),
}

/// Shortener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoint taking the long URL as the `url` query parameter.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://tinyurl.com/api-create.php".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// A service turning long URLs into short ones.
#[async_trait]
pub trait UrlShortener: Send + Sync {
    /// Returns the name of this shortener implementation.
    fn name(&self) -> &str;

    /// Shortens `long_url`.
    async fn shorten(&self, long_url: &str) -> Result<String, ShortenerError>;
}
