use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Error,
}

/// Body returned by `GET /images`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub status: ScrapeStatus,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub duplicates_removed: u64,
    #[serde(default)]
    pub time_seconds: f64,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub port_used: Option<u16>,
    /// Absolute image URLs in discovery order.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl ImagesResponse {
    pub fn is_success(&self) -> bool {
        self.status == ScrapeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_success_body() {
        let body = r#"{
            "status": "success",
            "url": "https://example.com",
            "total": 12,
            "count": 10,
            "duplicates_removed": 2,
            "time_seconds": 3.4,
            "request_id": "abc123",
            "port_used": 9222,
            "images": ["https://example.com/a.jpg", "https://example.com/b.png"]
        }"#;
        let resp: ImagesResponse = serde_json::from_str(body).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.images.len(), 2);
        assert_eq!(resp.duplicates_removed, 2);
        assert_eq!(resp.port_used, Some(9222));
        assert_eq!(resp.error, None);
    }

    #[test]
    fn parses_sparse_error_body() {
        let body = r#"{"status": "error", "error": "Page timed out", "error_type": "timeout"}"#;
        let resp: ImagesResponse = serde_json::from_str(body).unwrap();
        assert!(!resp.is_success());
        assert!(resp.images.is_empty());
        assert_eq!(resp.error.as_deref(), Some("Page timed out"));
        assert_eq!(resp.error_type.as_deref(), Some("timeout"));
    }

    #[test]
    fn rejects_unknown_status() {
        let body = r#"{"status": "pending"}"#;
        assert!(serde_json::from_str::<ImagesResponse>(body).is_err());
    }
}
