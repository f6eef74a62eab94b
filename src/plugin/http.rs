//! HTTP collaborator
//!
//! Converted sources never own a client. They are handed an
//! `Arc<dyn HttpFetcher>`, so the whole conversion can be exercised against
//! canned pages.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::core::config::HttpConfig;
use crate::core::error::{ConverterError, Result};

/// Fetches a page body as text.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` and return the body.
    ///
    /// # Errors
    /// Network failures and non-success status codes are errors.
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// [`HttpFetcher`] backed by a shared `reqwest` client.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConverterError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}
