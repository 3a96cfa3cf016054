//! End-to-end tests for `POST /api/scrape` against a fake Image Scraper API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use image_scraper_client::{ImagesResponse, ScrapeStatus, ScraperError};
use imagegrab_api::{router, AppState, ImageSource};
use imagegrab_common::{NormalizationPolicy, ScrapeResponse};

enum Behavior {
    Images(Vec<&'static str>),
    ReportError(Option<&'static str>),
    Unreachable,
    Status(u16),
}

struct FakeSource {
    behavior: Behavior,
    calls: Mutex<Vec<(String, bool)>>,
}

impl FakeSource {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

fn response(status: ScrapeStatus, images: Vec<String>, error: Option<String>) -> ImagesResponse {
    ImagesResponse {
        status,
        url: String::new(),
        total: images.len() as u64,
        count: images.len() as u64,
        duplicates_removed: 0,
        time_seconds: 0.5,
        request_id: None,
        port_used: None,
        images,
        error,
        error_type: None,
    }
}

#[async_trait]
impl ImageSource for FakeSource {
    async fn images(
        &self,
        url: &str,
        deep_scrape: bool,
    ) -> image_scraper_client::Result<ImagesResponse> {
        self.calls.lock().unwrap().push((url.to_string(), deep_scrape));
        match &self.behavior {
            Behavior::Images(urls) => Ok(response(
                ScrapeStatus::Success,
                urls.iter().map(|u| u.to_string()).collect(),
                None,
            )),
            Behavior::ReportError(msg) => Ok(response(
                ScrapeStatus::Error,
                Vec::new(),
                msg.map(String::from),
            )),
            Behavior::Unreachable => Err(ScraperError::Network("connection refused".into())),
            Behavior::Status(status) => Err(ScraperError::Api {
                status: *status,
                message: "upstream broke".into(),
            }),
        }
    }
}

fn state(source: Option<Arc<FakeSource>>, policy: NormalizationPolicy) -> Arc<AppState> {
    Arc::new(AppState {
        source: source.map(|s| s as Arc<dyn ImageSource>),
        policy,
    })
}

async fn post_scrape(state: Arc<AppState>, body: &str) -> (StatusCode, ScrapeResponse) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/scrape")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = router(state).oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let parsed: ScrapeResponse = serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("body was not a ScrapeResponse ({e}): {}", String::from_utf8_lossy(&bytes)));
    (status, parsed)
}

#[tokio::test]
async fn success_returns_numbered_records() {
    let source = FakeSource::new(Behavior::Images(vec![
        "https://example.com/a.jpg?v=1",
        "https://example.com/b.png",
        "https://example.com/a.jpg?v=2",
    ]));
    let (status, body) = post_scrape(
        state(Some(source.clone()), NormalizationPolicy::Aggressive),
        r#"{"url": " example.com ", "deepScrape": true}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    assert_eq!(body.images.len(), 2);
    assert_eq!(body.images[0].id, 1);
    assert_eq!(body.images[0].name, "a.jpg");
    assert_eq!(body.images[1].id, 2);

    let metadata = body.metadata.unwrap();
    assert_eq!(metadata.total_found, 2);
    assert_eq!(metadata.url, "https://example.com");

    assert_eq!(source.calls(), vec![("https://example.com".to_string(), true)]);
}

#[tokio::test]
async fn passthrough_forwards_original_input() {
    let source = FakeSource::new(Behavior::Images(vec![]));
    let (status, body) = post_scrape(
        state(Some(source.clone()), NormalizationPolicy::Passthrough),
        r#"{"url": "example.com/gallery"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    assert_eq!(source.calls(), vec![("example.com/gallery".to_string(), false)]);
}

#[tokio::test]
async fn invalid_urls_rejected_without_backend_call() {
    let cases = [
        (r#"{}"#, "URL is required"),
        (r#"{"url": "ftp://example.com"}"#, "FTP URLs are not supported. Please use HTTP or HTTPS."),
        (r#"{"url": "file:///etc/hosts"}"#, "Local file URLs are not supported."),
        (r#"{"url": "http://192.168.0.10"}"#, "Local or internal URLs are not supported."),
        (r#"{"url": "intranet"}"#, "Please enter a complete URL with domain (e.g., example.com)."),
    ];

    for (body, message) in cases {
        let source = FakeSource::new(Behavior::Images(vec!["https://example.com/a.jpg"]));
        let (status, resp) = post_scrape(state(Some(source.clone()), NormalizationPolicy::Aggressive), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(!resp.success);
        assert!(resp.images.is_empty());
        assert_eq!(resp.error.as_deref(), Some(message), "{body}");
        assert!(source.calls().is_empty(), "{body}");
    }
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (status, resp) = post_scrape(state(None, NormalizationPolicy::Aggressive), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!resp.success);
    assert!(resp.error.unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn missing_backend_is_server_error() {
    let (status, resp) = post_scrape(
        state(None, NormalizationPolicy::Aggressive),
        r#"{"url": "example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.error.as_deref(), Some("Image Scraper API URL not configured"));
}

#[tokio::test]
async fn unreachable_backend_is_service_unavailable() {
    let source = FakeSource::new(Behavior::Unreachable);
    let (status, resp) = post_scrape(
        state(Some(source), NormalizationPolicy::Aggressive),
        r#"{"url": "example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        resp.error.as_deref(),
        Some("Image Scraper API connection error: connection refused")
    );
}

#[tokio::test]
async fn upstream_status_passed_through() {
    let source = FakeSource::new(Behavior::Status(502));
    let (status, resp) = post_scrape(
        state(Some(source), NormalizationPolicy::Aggressive),
        r#"{"url": "example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(resp.error.as_deref(), Some("Image Scraper API error: 502"));
}

#[tokio::test]
async fn backend_error_surfaced_verbatim() {
    let source = FakeSource::new(Behavior::ReportError(Some("Page blocked by robots.txt")));
    let (status, resp) = post_scrape(
        state(Some(source), NormalizationPolicy::Aggressive),
        r#"{"url": "example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.error.as_deref(), Some("Page blocked by robots.txt"));

    let source = FakeSource::new(Behavior::ReportError(None));
    let (_, resp) = post_scrape(
        state(Some(source), NormalizationPolicy::Aggressive),
        r#"{"url": "example.com"}"#,
    )
    .await;
    assert_eq!(resp.error.as_deref(), Some("Scraping failed"));
}

#[tokio::test]
async fn health_check_ok() {
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = router(state(None, NormalizationPolicy::Aggressive))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["cache-control"], "no-store");
}
