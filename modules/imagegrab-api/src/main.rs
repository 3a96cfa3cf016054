use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imagegrab_api::{router, AppState};
use imagegrab_common::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("imagegrab=info".parse()?))
        .init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config)?;

    match config.image_scraper_api_url.as_deref() {
        Some(base_url) => info!(
            base_url,
            timeout_secs = config.scraper_timeout.as_secs(),
            policy = %config.normalization_policy,
            "Image Scraper API configured"
        ),
        None => warn!("IMAGE_SCRAPER_API_URL is not set; scrape requests will fail"),
    }

    let app = router(Arc::new(state));

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("imagegrab API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
