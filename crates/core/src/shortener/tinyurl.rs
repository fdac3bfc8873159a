//! TinyURL-compatible shortener client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{ShortenerConfig, ShortenerError, UrlShortener};

/// Client for `api-create.php`-style endpoints, which answer a GET with the
/// short URL as the plain-text body.
pub struct TinyUrlShortener {
    client: Client,
    endpoint: String,
}

impl TinyUrlShortener {
    pub fn new(config: &ShortenerConfig) -> Result<Self, ShortenerError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn parse_body(body: &str) -> Result<String, ShortenerError> {
        let short = body.trim();
        if short.starts_with("http://") || short.starts_with("https://") {
            Ok(short.to_string())
        } else {
            Err(ShortenerError::InvalidResponse(short.to_string()))
        }
    }
}

#[async_trait]
impl UrlShortener for TinyUrlShortener {
    fn name(&self) -> &str {
        "tinyurl"
    }

    async fn shorten(&self, long_url: &str) -> Result<String, ShortenerError> {
        debug!(url = %long_url, "Shortening URL");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", long_url)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ShortenerError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        Self::parse_body(&body)
    }
}
