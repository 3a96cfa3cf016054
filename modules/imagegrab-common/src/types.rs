use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder the frontend shows for any attribute the backend did not measure.
pub const UNKNOWN: &str = "Unknown";

// --- Image records ---

static DIMENSIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*[x×]\s*(\d+)$").unwrap());

/// Pixel dimensions of an image. On the wire this is `"WIDTHxHEIGHT"` or `"Unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimensions {
    Known { width: u32, height: u32 },
    #[default]
    Unknown,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Dimensions::Known { width, height }
    }

    /// Parse a `"WIDTHxHEIGHT"` label. Anything else is `Unknown`.
    pub fn parse(label: &str) -> Self {
        let Some(caps) = DIMENSIONS_RE.captures(label.trim()) else {
            return Dimensions::Unknown;
        };
        match (caps[1].parse(), caps[2].parse()) {
            (Ok(width), Ok(height)) => Dimensions::Known { width, height },
            _ => Dimensions::Unknown,
        }
    }

    pub fn width(&self) -> Option<u32> {
        match self {
            Dimensions::Known { width, .. } => Some(*width),
            Dimensions::Unknown => None,
        }
    }

    /// Total pixel count, 0 when unknown.
    pub fn pixels(&self) -> u64 {
        match self {
            Dimensions::Known { width, height } => u64::from(*width) * u64::from(*height),
            Dimensions::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimensions::Known { width, height } => write!(f, "{width}x{height}"),
            Dimensions::Unknown => write!(f, "{UNKNOWN}"),
        }
    }
}

impl Serialize for Dimensions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Dimensions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Dimensions::parse(&label))
    }
}

/// `None` is written as `"Unknown"` and `"Unknown"` reads back as `None`.
mod unknown_as_none {
    use super::UNKNOWN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(UNKNOWN))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.filter(|l| !l.is_empty() && l != UNKNOWN))
    }
}

fn default_true() -> bool {
    true
}

/// One discovered image, as shown in the results grid.
/// Ids are only meaningful within a single result set and start at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: u32,
    /// Absolute URL of the image asset.
    pub src: String,
    /// Display file name derived from the last path segment.
    pub name: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default, with = "unknown_as_none")]
    pub size: Option<String>,
    #[serde(rename = "defaultChecked", default = "default_true")]
    pub default_selected: bool,
    /// Page the image was extracted from. Set in batch mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ImageRecord {
    pub fn new(id: u32, src: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            src: src.into(),
            name: name.into(),
            dimensions: Dimensions::Unknown,
            size: None,
            default_selected: true,
            source_url: None,
        }
    }
}

/// Renumber ids from 1 in current order.
pub fn resequence(records: &mut [ImageRecord]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.id = index as u32 + 1;
    }
}

// --- Scrape endpoint wire types ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub deep_scrape: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub total_found: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScrapeMetadata>,
}

impl ScrapeResponse {
    pub fn found(images: Vec<ImageRecord>, url: impl Into<String>) -> Self {
        let metadata = ScrapeMetadata {
            total_found: images.len(),
            url: url.into(),
        };
        Self {
            success: true,
            images,
            error: None,
            metadata: Some(metadata),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            images: Vec::new(),
            error: Some(error.into()),
            metadata: None,
        }
    }
}

// --- Batch progress ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Processing => write!(f, "processing"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of one URL in a multi-URL batch.
/// Moves pending → processing → completed | failed and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUrlState {
    pub url: String,
    pub status: BatchStatus,
    pub image_count: usize,
    /// 1-based place in the request queue while waiting for a slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchUrlState {
    pub fn pending(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: BatchStatus::Pending,
            image_count: 0,
            queue_position: None,
            error: None,
        }
    }

    /// Record the queue position of a pending URL. Returns whether anything changed.
    pub fn wait(&mut self, position: Option<usize>) -> bool {
        if self.status != BatchStatus::Pending || self.queue_position == position {
            return false;
        }
        self.queue_position = position;
        true
    }

    /// Returns false if the state had already left `Pending`.
    pub fn start(&mut self) -> bool {
        if self.status != BatchStatus::Pending {
            return false;
        }
        self.status = BatchStatus::Processing;
        self.queue_position = None;
        true
    }

    pub fn complete(&mut self, image_count: usize) -> bool {
        if self.status.is_settled() {
            return false;
        }
        self.status = BatchStatus::Completed;
        self.image_count = image_count;
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_settled() {
            return false;
        }
        self.status = BatchStatus::Failed;
        self.error = Some(error.into());
        true
    }
}

// --- Filtering ---

/// Narrowing applied to a result set. Empty sets and a zero width mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Uppercase extensions, e.g. `PNG`.
    pub allowed_formats: HashSet<String>,
    pub min_width_px: u32,
    pub allowed_source_urls: HashSet<String>,
}

impl FilterCriteria {
    pub fn is_unrestricted(&self) -> bool {
        self.allowed_formats.is_empty()
            && self.min_width_px == 0
            && self.allowed_source_urls.is_empty()
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_formats = formats
            .into_iter()
            .map(|f| f.as_ref().trim_start_matches('.').to_uppercase())
            .collect();
        self
    }

    pub fn with_min_width(mut self, min_width_px: u32) -> Self {
        self.min_width_px = min_width_px;
        self
    }

    pub fn with_source_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_source_urls = urls.into_iter().map(Into::into).collect();
        self
    }
}
