pub mod error;
pub mod types;

pub use error::{Result, ScraperError};
pub use types::{ImagesResponse, ScrapeStatus};

use std::time::Duration;

pub struct ImageScraperClient {
    client: reqwest::Client,
    base_url: String,
}

impl ImageScraperClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScraperError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the backend to discover the images on `url`.
    ///
    /// A response with `status: "error"` is returned as `Ok`; callers decide how to surface it.
    pub async fn images(&self, url: &str, deep_scrape: bool) -> Result<ImagesResponse> {
        let endpoint = format!("{}/images", self.base_url);
        let deep = if deep_scrape { "true" } else { "false" };

        tracing::debug!(url, deep_scrape, "Requesting images from Image Scraper API");

        let resp = self
            .client
            .get(&endpoint)
            .query(&[("url", url), ("deep_scrape", deep)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ScraperError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let parsed: ImagesResponse = serde_json::from_str(&body)?;
        tracing::debug!(
            url,
            status = ?parsed.status,
            count = parsed.images.len(),
            "Image Scraper API responded"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = ImageScraperClient::new("https://scraper.example.com//", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://scraper.example.com");
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        // Port 9 on loopback is discard; nothing listens there in test environments.
        let client = ImageScraperClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.images("https://example.com", false).await.unwrap_err();
        assert!(matches!(err, ScraperError::Network(_)), "{err:?}");
    }
}
