use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::domain::models::RawHeight;
use crate::domain::types::Height;
use crate::infrastructure::source::error::SourceError;
use crate::infrastructure::source::BlockSource;
use crate::utils::logging;

#[derive(Debug, Deserialize)]
struct HeadResponse {
    height: Height,
}

/// Client for the chain worker HTTP API
pub struct HttpBlockSource {
    client: Client,
    url: String,
}

impl HttpBlockSource {
    /// Create a new worker client
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| SourceError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpBlockSource {
            client,
            url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn check_status(
        status: StatusCode,
        height: Option<Height>,
        url: &str,
    ) -> Result<(), SourceError> {
        if status.is_success() {
            return Ok(());
        }
        match (status.as_u16(), height) {
            (404, Some(height)) => Err(SourceError::NotFound(height)),
            (429, _) | (500..=599, _) => {
                logging::log_warning(&format!(
                    "Worker error {}: temporarily unavailable for {}",
                    status, url
                ));
                Err(SourceError::Transient(format!("worker returned {}", status)))
            }
            _ => {
                logging::log_error(&format!("Worker returned error status {} for {}", status, url));
                Err(SourceError::Decode(format!("worker returned {}", status)))
            }
        }
    }
}

#[async_trait]
impl BlockSource for HttpBlockSource {
    async fn chain_head(&self) -> Result<Height, SourceError> {
        let url = format!("{}/head", self.url);
        let response = self.client.get(&url).send().await?;
        Self::check_status(response.status(), None, &url)?;

        let head: HeadResponse = response.json().await?;
        Ok(head.height)
    }

    async fn get_height(&self, height: Height) -> Result<RawHeight, SourceError> {
        let url = format!("{}/blocks/{}", self.url, height);
        let response = self.client.get(&url).send().await?;
        Self::check_status(response.status(), Some(height), &url)?;

        let raw: RawHeight = response.json().await?;
        if raw.block.height != height {
            return Err(SourceError::Decode(format!(
                "asked for height {}, worker answered {}",
                height, raw.block.height
            )));
        }
        Ok(raw)
    }
}
