//! HTTP access to link-local metadata endpoints.

use std::time::Duration;

use crate::Result;
use crate::config::session::{DEFAULT_METADATA_SERVICE_NUM_ATTEMPTS, DEFAULT_METADATA_SERVICE_TIMEOUT};

/// GETs with a per-request timeout and a fixed number of attempts.
#[derive(Clone, Debug)]
pub(crate) struct MetadataClient {
    client: reqwest::Client,
    timeout: Duration,
    num_attempts: u32,
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new(
            DEFAULT_METADATA_SERVICE_TIMEOUT,
            DEFAULT_METADATA_SERVICE_NUM_ATTEMPTS,
        )
    }
}

impl MetadataClient {
    pub(crate) fn new(timeout: Duration, num_attempts: u32) -> Self {
        // Metadata endpoints are link-local and must not go through a proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            timeout,
            num_attempts: num_attempts.max(1),
        }
    }

    /// Body of the first successful response, or the last attempt's error.
    pub(crate) async fn get_text(&self, url: &str, header: Option<(&str, &str)>) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.try_get(url, header).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "Metadata request failed");
                    if attempt >= self.num_attempts {
                        return Err(e.into());
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn try_get(&self, url: &str, header: Option<(&str, &str)>) -> reqwest::Result<String> {
        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some((name, value)) = header {
            request = request.header(name, value);
        }
        request.send().await?.error_for_status()?.text().await
    }
}
