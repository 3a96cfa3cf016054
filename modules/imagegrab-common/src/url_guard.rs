use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

/// Longest URL accepted from a user.
pub const MAX_URL_LEN: usize = 2048;

/// Default cap on URLs accepted from one batch input.
pub const DEFAULT_MAX_BATCH_URLS: usize = 5;

/// What gets forwarded to the backend once a URL has passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Forward the normalized absolute URL.
    #[default]
    Aggressive,
    /// Validate the normalized form but forward the user's trimmed input untouched.
    Passthrough,
}

impl FromStr for NormalizationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" | "normalize" => Ok(NormalizationPolicy::Aggressive),
            "passthrough" | "validate-only" => Ok(NormalizationPolicy::Passthrough),
            other => Err(format!(
                "unknown normalization policy '{other}' (expected aggressive or passthrough)"
            )),
        }
    }
}

impl std::fmt::Display for NormalizationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizationPolicy::Aggressive => write!(f, "aggressive"),
            NormalizationPolicy::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Why a user-supplied URL was refused. The messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("URL is required")]
    Required,

    #[error("URL too long (max {MAX_URL_LEN} characters)")]
    TooLong,

    #[error("FTP URLs are not supported. Please use HTTP or HTTPS.")]
    FtpScheme,

    #[error("Local file URLs are not supported.")]
    FileScheme,

    #[error("Invalid URL format. Please enter a valid website URL.")]
    InvalidFormat,

    #[error("URL must include a valid domain name.")]
    MissingHost,

    #[error("Local or internal URLs are not supported.")]
    PrivateHost,

    #[error("Please enter a complete URL with domain (e.g., example.com).")]
    IncompleteDomain,
}

/// A URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// The parsed, normalized form.
    pub url: Url,
    /// The string to send to the backend, chosen by the policy.
    pub forward: String,
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}

fn starts_with_ci(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Rewrite a raw string into an absolute http(s) URL string without parsing it.
pub fn normalize_url(raw: &str) -> Result<String, UrlRejection> {
    let trimmed = strip_quotes(raw);
    if trimmed.is_empty() {
        return Err(UrlRejection::Required);
    }
    if trimmed.len() > MAX_URL_LEN {
        return Err(UrlRejection::TooLong);
    }

    if starts_with_ci(trimmed, "http://") || starts_with_ci(trimmed, "https://") {
        return Ok(trimmed.to_string());
    }
    if trimmed.starts_with("//") {
        return Ok(format!("https:{trimmed}"));
    }
    for scheme in ["https:", "http:"] {
        if starts_with_ci(trimmed, scheme) {
            let (head, rest) = trimmed.split_at(scheme.len());
            return Ok(format!("{head}//{rest}"));
        }
    }
    if starts_with_ci(trimmed, "ftp://") {
        return Err(UrlRejection::FtpScheme);
    }
    if starts_with_ci(trimmed, "file://") {
        return Err(UrlRejection::FileScheme);
    }
    Ok(format!("https://{trimmed}"))
}

/// Normalize, parse and screen a user-supplied URL before any network call.
pub fn validate_url(raw: &str, policy: NormalizationPolicy) -> Result<ValidatedUrl, UrlRejection> {
    let normalized = normalize_url(raw)?;
    let url = Url::parse(&normalized).map_err(|_| UrlRejection::InvalidFormat)?;

    let hostname = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => return Err(UrlRejection::MissingHost),
    };

    if is_internal_hostname(&hostname) || url.host().is_some_and(|h| is_internal_host(&h)) {
        return Err(UrlRejection::PrivateHost);
    }
    if !hostname.contains('.') {
        return Err(UrlRejection::IncompleteDomain);
    }

    let forward = match policy {
        NormalizationPolicy::Aggressive => normalized,
        NormalizationPolicy::Passthrough => strip_quotes(raw).to_string(),
    };
    Ok(ValidatedUrl { url, forward })
}

/// Coarse hostname screen: loopback names and the common private prefixes.
fn is_internal_hostname(hostname: &str) -> bool {
    hostname == "localhost"
        || hostname == "127.0.0.1"
        || hostname.starts_with("192.168.")
        || hostname.starts_with("10.")
        || hostname.starts_with("172.")
}

fn is_internal_host(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(v4) => is_private_ip(IpAddr::V4(*v4)),
        Host::Ipv6(v6) => is_private_ip(IpAddr::V6(*v6)),
        Host::Domain(_) => false,
    }
}

/// Check if an IP address is loopback, link-local or in a private range (RFC 1918 / RFC 4193).
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.octets()[0] == 10
                || (v4.octets()[0] == 172 && (16..=31).contains(&v4.octets()[1]))
                || (v4.octets()[0] == 192 && v4.octets()[1] == 168)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}

// --- Batch input ---

/// Split free-form input on newlines and commas, drop blanks and repeats, keep at most `max_urls`.
pub fn parse_urls_from_input(input: &str, max_urls: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    input
        .split(['\n', ','])
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .filter(|u| seen.insert(*u))
        .take(max_urls)
        .map(String::from)
        .collect()
}

/// Valid and invalid URLs from a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlPartition {
    /// Normalized forms of the accepted URLs.
    pub valid: Vec<String>,
    /// Rejected inputs, as typed.
    pub invalid: Vec<String>,
}

pub fn validate_urls<S: AsRef<str>>(urls: &[S]) -> UrlPartition {
    let mut partition = UrlPartition::default();
    for raw in urls {
        let raw = raw.as_ref();
        match validate_url(raw, NormalizationPolicy::Aggressive) {
            Ok(validated) => partition.valid.push(validated.forward),
            Err(_) => partition.invalid.push(raw.to_string()),
        }
    }
    partition
}

/// Host for display, without a leading `www.`. Falls back to the input when unparsable.
pub fn display_hostname(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            host.strip_prefix("www.").unwrap_or(host).to_string()
        }
        Err(_) => url.to_string(),
    }
}
