//! Collapsing of image URLs that point at the same underlying asset.
//!
//! CDNs and CMSes publish one picture under many URLs: cache-busting query
//! strings, `_300x300` renditions, `@2x` retina copies, `/thumb/` folders.
//! [`variant_key`] folds those into one key; [`deduplicate`] keeps the first
//! record seen for each key.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::types::{resequence, ImageRecord};

static SIZE_FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/\d+x\d+/").unwrap());
static NAMED_FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/(thumbnail|thumb|small|medium|large)/").unwrap());
static SIZE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[-_]?\d+x\d+").unwrap());
static NAMED_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[-_](thumbnail|thumb|small|medium|large|xs|sm|md|lg|xl)").unwrap()
});
static DENSITY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)@\d+x").unwrap());
static PROCESSED_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[-_](preview|scaled|resized|compressed)").unwrap());
static AXIS_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[-_][wh]\d+").unwrap());

/// Records that survived deduplication, renumbered from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupResult {
    pub images: Vec<ImageRecord>,
    pub duplicates_removed: usize,
}

fn literal_key(url: &str) -> String {
    let lower = url.to_lowercase();
    lower.strip_suffix('/').map(String::from).unwrap_or(lower)
}

/// Key that ignores the query string and common size-variant markers in the path.
pub fn variant_key(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return literal_key(url);
    };

    let mut path = parsed.path().to_string();
    // Folders first, so `/300x300/` collapses to `/` instead of leaving `//`.
    for re in [&*SIZE_FOLDER_RE, &*NAMED_FOLDER_RE] {
        while re.is_match(&path) {
            path = re.replace_all(&path, "/").into_owned();
        }
    }
    for re in [
        &*SIZE_SUFFIX_RE,
        &*NAMED_SUFFIX_RE,
        &*DENSITY_SUFFIX_RE,
        &*PROCESSED_SUFFIX_RE,
        &*AXIS_SUFFIX_RE,
    ] {
        path = re.replace_all(&path, "").into_owned();
    }

    literal_key(&format!("{}{}", parsed.origin().ascii_serialization(), path))
}

/// Key that only ignores the query string.
pub fn exact_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => literal_key(&format!(
            "{}{}",
            parsed.origin().ascii_serialization(),
            parsed.path()
        )),
        Err(_) => literal_key(url),
    }
}

/// Drop records whose [`variant_key`] was already seen. First occurrence wins and
/// survivors keep their relative order.
pub fn deduplicate(records: impl IntoIterator<Item = ImageRecord>) -> DedupResult {
    let mut seen = HashSet::new();
    let mut images = Vec::new();
    let mut duplicates_removed = 0;

    for record in records {
        if seen.insert(variant_key(&record.src)) {
            images.push(record);
        } else {
            duplicates_removed += 1;
        }
    }

    resequence(&mut images);
    DedupResult {
        images,
        duplicates_removed,
    }
}
