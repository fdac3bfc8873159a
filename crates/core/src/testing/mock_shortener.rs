//! Mock URL shortener for testing.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::shortener::{ShortenerError, UrlShortener};

/// Mock implementation of the UrlShortener trait.
///
/// Answers every call with a fixed short URL, or fails when built with
/// [`MockShortener::failing`]. An optional delay simulates a slow service.
#[derive(Debug)]
pub struct MockShortener {
    short_url: Option<String>,
    delay: Option<Duration>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockShortener {
    /// Shortener answering with `short_url`.
    pub fn new(short_url: impl Into<String>) -> Self {
        Self {
            short_url: Some(short_url.into()),
            delay: None,
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Shortener whose service always errors.
    pub fn failing() -> Self {
        Self {
            short_url: None,
            delay: None,
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Long URLs received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl UrlShortener for MockShortener {
    fn name(&self) -> &str {
        "mock"
    }

    async fn shorten(&self, long_url: &str) -> Result<String, ShortenerError> {
        self.requests.write().unwrap().push(long_url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.short_url.clone().ok_or_else(|| ShortenerError::ApiError {
            status: 503,
            message: "mock shortener unavailable".to_string(),
        })
    }
}
