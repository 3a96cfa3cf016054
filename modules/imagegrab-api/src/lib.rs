use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use image_scraper_client::{ImageScraperClient, ImagesResponse};
use imagegrab_common::{Config, NormalizationPolicy};
use tower_http::set_header::SetResponseHeaderLayer;

pub mod rest;

/// Upstream that discovers images on a page.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn images(
        &self,
        url: &str,
        deep_scrape: bool,
    ) -> image_scraper_client::Result<ImagesResponse>;
}

#[async_trait]
impl ImageSource for ImageScraperClient {
    async fn images(
        &self,
        url: &str,
        deep_scrape: bool,
    ) -> image_scraper_client::Result<ImagesResponse> {
        ImageScraperClient::images(self, url, deep_scrape).await
    }
}

pub struct AppState {
    /// `None` when no backend URL is configured.
    pub source: Option<Arc<dyn ImageSource>>,
    pub policy: NormalizationPolicy,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = match config.image_scraper_api_url.as_deref() {
            Some(base_url) => {
                let client = ImageScraperClient::new(base_url, config.scraper_timeout)?;
                Some(Arc::new(client) as Arc<dyn ImageSource>)
            }
            None => None,
        };
        Ok(Self {
            source,
            policy: config.normalization_policy,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route("/api/scrape", post(rest::scrape::api_scrape))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Results depend on the live page; never cache them.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Method + path only; the scraped URL travels in the body and is logged by the handler.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
