use std::collections::HashSet;

use url::Url;

use crate::dedup::exact_key;
use crate::types::ImageRecord;

/// File name shown for an image URL: the last path segment, with `.jpg` appended
/// when it carries no extension.
pub fn extract_filename(src: &str) -> String {
    let Ok(parsed) = Url::parse(src) else {
        return "image.jpg".to_string();
    };

    let last = parsed
        .path()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("image");

    if last.contains('.') {
        last.to_string()
    } else {
        format!("{last}.jpg")
    }
}

/// Build a fresh result set from the backend's image URL list.
/// URLs differing only by query string are collapsed, keeping the first.
pub fn images_from_urls<S: AsRef<str>>(urls: &[S]) -> Vec<ImageRecord> {
    let mut seen = HashSet::new();
    urls.iter()
        .map(AsRef::as_ref)
        .filter(|src| seen.insert(exact_key(src)))
        .enumerate()
        .map(|(index, src)| ImageRecord::new(index as u32 + 1, src, extract_filename(src)))
        .collect()
}
