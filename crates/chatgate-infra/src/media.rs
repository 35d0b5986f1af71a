//! HTTP implementation of `MediaFetcher`.
//!
//! Downloads the whole body into memory before a send, refusing anything
//! larger than the configured limit.

use std::time::Duration;

use chatgate_core::media::MediaFetcher;
use chatgate_types::config::DispatchConfig;
use chatgate_types::error::MediaError;
use tracing::debug;

/// Fetches remote media with a shared reqwest client.
#[derive(Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, max_bytes })
    }

    pub fn from_config(config: &DispatchConfig) -> Result<Self, MediaError> {
        Self::new(
            Duration::from_secs(config.media_timeout_secs),
            config.media_max_bytes,
        )
    }
}

impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }

        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(MediaError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(MediaError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "Media fetched");
        Ok(body)
    }
}
