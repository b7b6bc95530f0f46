use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::types::{BotError, FetchConfig, Result};

/// Retrieves the raw payload behind a feed link.
///
/// The bot flows depend on this trait rather than on a concrete HTTP
/// client, so tests can serve canned payloads.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch(&self, link: &str) -> Result<String>;
}

/// HTTP implementation of [`FeedClient`] backed by a shared reqwest client.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl FeedClient for Fetcher {
    async fn fetch(&self, link: &str) -> Result<String> {
        let url = Url::parse(link).map_err(|e| BotError::InvalidLink {
            link: link.to_string(),
            detail: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(BotError::InvalidLink {
                    link: link.to_string(),
                    detail: format!("unsupported scheme '{}'", other),
                });
            }
        }

        debug!("Fetching feed from {}", link);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BotError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Received {} bytes from {}", body.len(), link);
        Ok(body)
    }
}
