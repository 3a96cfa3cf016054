use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{FilterCriteria, ImageRecord};

static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([a-zA-Z0-9]+)(?:\?.*)?$").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([\d.]+)\s*(B|KB|MB|GB)?$").unwrap());

/// Label used for names without a recognizable extension.
pub const UNKNOWN_FORMAT: &str = "UNKNOWN";

/// Uppercase extension of a display name, e.g. `PNG`.
pub fn format_of(name: &str) -> String {
    EXTENSION_RE
        .captures(name)
        .map(|caps| caps[1].to_uppercase())
        .unwrap_or_else(|| UNKNOWN_FORMAT.to_string())
}

/// Whether a record passes every active restriction in `criteria`.
/// Records with unknown dimensions are never excluded by the width restriction.
pub fn matches(record: &ImageRecord, criteria: &FilterCriteria) -> bool {
    if !criteria.allowed_formats.is_empty()
        && !criteria.allowed_formats.contains(&format_of(&record.name))
    {
        return false;
    }

    if criteria.min_width_px > 0 {
        if let Some(width) = record.dimensions.width() {
            if width < criteria.min_width_px {
                return false;
            }
        }
    }

    if !criteria.allowed_source_urls.is_empty() {
        let allowed = record
            .source_url
            .as_ref()
            .is_some_and(|u| criteria.allowed_source_urls.contains(u));
        if !allowed {
            return false;
        }
    }

    true
}

/// Read-only projection of `records` through `criteria`, order preserved.
pub fn filter_images<'a>(records: &'a [ImageRecord], criteria: &FilterCriteria) -> Vec<&'a ImageRecord> {
    if criteria.is_unrestricted() {
        return records.iter().collect();
    }
    records.iter().filter(|r| matches(r, criteria)).collect()
}

/// Per-format counts for the filter sidebar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatStats {
    pub formats: BTreeMap<String, usize>,
    pub total_count: usize,
}

pub fn format_stats(records: &[ImageRecord]) -> FormatStats {
    let mut formats = BTreeMap::new();
    for record in records {
        *formats.entry(format_of(&record.name)).or_insert(0) += 1;
    }
    FormatStats {
        formats,
        total_count: records.len(),
    }
}

/// Ids of the records that start out selected.
pub fn default_selection(records: &[ImageRecord]) -> HashSet<u32> {
    records
        .iter()
        .filter(|r| r.default_selected)
        .map(|r| r.id)
        .collect()
}

// --- Sorting ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Largest file first.
    #[default]
    Size,
    /// Alphabetical by name.
    Name,
    /// Most pixels first.
    Dimensions,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "size" => Ok(SortOrder::Size),
            "name" => Ok(SortOrder::Name),
            "dimensions" => Ok(SortOrder::Dimensions),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// Parse a human size label like `"1.5 MB"` into bytes. Unparsable labels are 0.
pub fn parse_size_to_bytes(label: &str) -> f64 {
    let Some(caps) = SIZE_RE.captures(label.trim()) else {
        return 0.0;
    };
    let Ok(value) = caps[1].parse::<f64>() else {
        return 0.0;
    };
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()).as_deref() {
        Some("KB") => 1024.0,
        Some("MB") => 1024.0 * 1024.0,
        Some("GB") => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    value * multiplier
}

fn size_bytes(record: &ImageRecord) -> f64 {
    record.size.as_deref().map(parse_size_to_bytes).unwrap_or(0.0)
}

/// Stable sort; ties keep their current order.
pub fn sort_images(records: &mut [ImageRecord], order: SortOrder) {
    records.sort_by(|a, b| match order {
        SortOrder::Size => size_bytes(b).total_cmp(&size_bytes(a)),
        SortOrder::Name => compare_names(&a.name, &b.name),
        SortOrder::Dimensions => b.dimensions.pixels().cmp(&a.dimensions.pixels()),
    });
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn named(id: u32, name: &str) -> ImageRecord {
        ImageRecord::new(id, format!("https://a.com/{name}"), name)
    }

    #[test]
    fn format_from_name() {
        assert_eq!(format_of("cat.jpg"), "JPG");
        assert_eq!(format_of("cat.Png"), "PNG");
        assert_eq!(format_of("cat.webp?x=1"), "WEBP");
        assert_eq!(format_of("cat"), UNKNOWN_FORMAT);
    }

    #[test]
    fn format_restriction() {
        let records = vec![named(1, "a.jpg"), named(2, "b.png"), named(3, "c.png")];
        let criteria = FilterCriteria::default().with_formats(["png"]);
        let passed = filter_images(&records, &criteria);
        assert_eq!(passed.len(), 2);
        assert!(passed.iter().all(|r| r.name.ends_with(".png")));
    }

    #[test]
    fn unknown_dimensions_pass_width_restriction() {
        let mut small = named(1, "small.jpg");
        small.dimensions = Dimensions::new(200, 100);
        let mut big = named(2, "big.jpg");
        big.dimensions = Dimensions::new(800, 600);
        let unknown = named(3, "mystery.jpg");

        let records = vec![small, big, unknown];
        let criteria = FilterCriteria::default().with_min_width(500);
        let ids: Vec<_> = filter_images(&records, &criteria).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn source_restriction() {
        let mut a = named(1, "a.jpg");
        a.source_url = Some("https://one.com".into());
        let mut b = named(2, "b.jpg");
        b.source_url = Some("https://two.com".into());
        let c = named(3, "c.jpg");

        let records = vec![a, b, c];
        let criteria = FilterCriteria::default().with_source_urls(["https://two.com"]);
        let ids: Vec<_> = filter_images(&records, &criteria).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn unrestricted_passes_everything_and_is_idempotent() {
        let records = vec![named(1, "a.jpg"), named(2, "b")];
        let criteria = FilterCriteria::default();
        assert!(criteria.is_unrestricted());
        assert_eq!(filter_images(&records, &criteria).len(), 2);

        let criteria = FilterCriteria::default().with_formats(["JPG"]);
        let once: Vec<ImageRecord> = filter_images(&records, &criteria).into_iter().cloned().collect();
        let twice: Vec<ImageRecord> = filter_images(&once, &criteria).into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn stats_count_formats() {
        let records = vec![named(1, "a.jpg"), named(2, "b.png"), named(3, "c.PNG"), named(4, "d")];
        let stats = format_stats(&records);
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.formats["PNG"], 2);
        assert_eq!(stats.formats["JPG"], 1);
        assert_eq!(stats.formats[UNKNOWN_FORMAT], 1);
    }

    #[test]
    fn size_labels() {
        assert_eq!(parse_size_to_bytes("512"), 512.0);
        assert_eq!(parse_size_to_bytes("2 KB"), 2048.0);
        assert_eq!(parse_size_to_bytes("1.5mb"), 1.5 * 1024.0 * 1024.0);
        assert_eq!(parse_size_to_bytes("Unknown"), 0.0);
    }

    #[test]
    fn sort_by_each_order() {
        let mut a = named(1, "b.jpg");
        a.size = Some("10 KB".into());
        a.dimensions = Dimensions::new(10, 10);
        let mut b = named(2, "a.jpg");
        b.size = Some("1 MB".into());
        let mut c = named(3, "C.jpg");
        c.dimensions = Dimensions::new(100, 100);
        let mut records = vec![a, b, c];

        sort_images(&mut records, SortOrder::Size);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1, 3]);

        sort_images(&mut records, SortOrder::Name);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1, 3]);

        sort_images(&mut records, SortOrder::Dimensions);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 1, 2]);
    }

    #[test]
    fn default_selection_uses_flag() {
        let mut records = vec![named(1, "a.jpg"), named(2, "b.jpg")];
        records[1].default_selected = false;
        assert_eq!(default_selection(&records), HashSet::from([1]));
    }
}
