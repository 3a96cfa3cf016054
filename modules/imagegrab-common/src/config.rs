use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::url_guard::NormalizationPolicy;

/// Upper bound on one backend extraction call.
pub const DEFAULT_SCRAPER_TIMEOUT: Duration = Duration::from_secs(120);

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Image Scraper API
    pub image_scraper_api_url: Option<String>,
    pub scraper_timeout: Duration,

    // Input handling
    pub normalization_policy: NormalizationPolicy,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_scraper_api_url: None,
            scraper_timeout: DEFAULT_SCRAPER_TIMEOUT,
            normalization_policy: NormalizationPolicy::default(),
            web_host: "0.0.0.0".to_string(),
            web_port: 3000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// A missing backend URL is not an error here; scrape requests report it instead.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let image_scraper_api_url = lookup("IMAGE_SCRAPER_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let scraper_timeout = match lookup("IMAGE_SCRAPER_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "IMAGE_SCRAPER_TIMEOUT_SECS",
                expected: "a number of seconds",
                value: v.clone(),
            })?),
            None => defaults.scraper_timeout,
        };

        let normalization_policy = match lookup("URL_NORMALIZATION") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                key: "URL_NORMALIZATION",
                expected: "aggressive or passthrough",
                value: v.clone(),
            })?,
            None => defaults.normalization_policy,
        };

        let web_port = match lookup("WEB_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "WEB_PORT",
                expected: "a port number",
                value: v.clone(),
            })?,
            None => defaults.web_port,
        };

        Ok(Self {
            image_scraper_api_url,
            scraper_timeout,
            normalization_policy,
            web_host: lookup("WEB_HOST").unwrap_or(defaults.web_host),
            web_port,
        })
    }
}
