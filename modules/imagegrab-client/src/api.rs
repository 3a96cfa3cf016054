use std::time::Duration;

use async_trait::async_trait;
use imagegrab_common::{ImageRecord, ScrapeRequest, ScrapeResponse};

use crate::error::{ClientError, Result};

/// Slightly longer than the server's own bound on a backend call, so the
/// server's connection-error answer arrives before we give up.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(125);

/// One extraction call: discover the images on a page.
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(&self, url: &str, deep_scrape: bool) -> Result<Vec<ImageRecord>>;
}

/// Client for `POST /api/scrape`.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw scrape call. A `success: false` body is an error carrying the server's message.
    pub async fn scrape(&self, url: &str, deep_scrape: bool) -> Result<ScrapeResponse> {
        let endpoint = format!("{}/api/scrape", self.base_url);
        let body = ScrapeRequest {
            url: url.to_string(),
            deep_scrape,
        };

        let resp = self.client.post(&endpoint).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        interpret_response(status.as_u16(), &text)
    }
}

/// Failure bodies carry the useful message even on non-2xx statuses, so the
/// body is read first and the status only matters when it isn't a `ScrapeResponse`.
fn interpret_response(status: u16, text: &str) -> Result<ScrapeResponse> {
    match serde_json::from_str::<ScrapeResponse>(text) {
        Ok(resp) if resp.success => Ok(resp),
        Ok(resp) => Err(ClientError::Rejected(
            resp.error
                .unwrap_or_else(|| "Failed to scrape the page".to_string()),
        )),
        Err(_) if !(200..300).contains(&status) => Err(ClientError::Api {
            status,
            message: text.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ImageExtractor for ApiClient {
    async fn extract(&self, url: &str, deep_scrape: bool) -> Result<Vec<ImageRecord>> {
        let resp = self.scrape(url, deep_scrape).await?;
        tracing::debug!(url, count = resp.images.len(), "scrape succeeded");
        Ok(resp.images)
    }
}
