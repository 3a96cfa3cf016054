use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use image_scraper_client::ScraperError;
use thiserror::Error;
use tracing::{info, warn};

use imagegrab_common::{images_from_urls, validate_url, ScrapeRequest, ScrapeResponse, UrlRejection};

use crate::AppState;

/// Everything that can end a scrape request early, in user-facing wording.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid request body: {0}")]
    Body(String),

    #[error(transparent)]
    Validation(#[from] UrlRejection),

    #[error("Image Scraper API URL not configured")]
    NotConfigured,

    #[error("Image Scraper API connection error: {0}")]
    Connection(String),

    #[error("Image Scraper API error: {status}")]
    Upstream { status: u16 },

    #[error("{0}")]
    Backend(String),

    #[error("Invalid response from Image Scraper API: {0}")]
    Malformed(String),
}

impl ScrapeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScrapeError::Body(_) | ScrapeError::Validation(_) => StatusCode::BAD_REQUEST,
            ScrapeError::NotConfigured | ScrapeError::Backend(_) | ScrapeError::Malformed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ScrapeError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScrapeError::Upstream { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

impl From<ScraperError> for ScrapeError {
    fn from(err: ScraperError) -> Self {
        match err {
            ScraperError::Network(msg) | ScraperError::Config(msg) => ScrapeError::Connection(msg),
            ScraperError::Api { status, .. } => ScrapeError::Upstream { status },
            ScraperError::Parse(msg) => ScrapeError::Malformed(msg),
        }
    }
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ScrapeResponse::failure(self.to_string()))).into_response()
    }
}

/// Validate the URL, forward it to the backend, and shape the images into records.
pub async fn scrape(state: &AppState, req: &ScrapeRequest) -> Result<ScrapeResponse, ScrapeError> {
    let validated = validate_url(&req.url, state.policy)?;

    let source = state.source.as_ref().ok_or(ScrapeError::NotConfigured)?;

    let upstream = source
        .images(&validated.forward, req.deep_scrape)
        .await
        .map_err(|e| {
            warn!(url = %validated.forward, error = %e, "Image Scraper API call failed");
            ScrapeError::from(e)
        })?;

    if !upstream.is_success() {
        let message = upstream
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Scraping failed".to_string());
        warn!(url = %validated.forward, error_type = ?upstream.error_type, "Image Scraper API reported an error");
        return Err(ScrapeError::Backend(message));
    }

    let images = images_from_urls(&upstream.images);
    info!(
        url = %validated.forward,
        deep_scrape = req.deep_scrape,
        returned = upstream.images.len(),
        count = images.len(),
        "Scrape completed"
    );

    Ok(ScrapeResponse::found(images, validated.forward))
}

pub async fn api_scrape(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => return ScrapeError::Body(rejection.body_text()).into_response(),
    };

    match scrape(&state, &req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}
