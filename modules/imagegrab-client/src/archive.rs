//! Bundling selected images into a ZIP archive.

use std::collections::{HashMap, HashSet};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use imagegrab_common::ImageRecord;

use crate::error::{ClientError, Result};

/// Per-image download bound.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// One file to place in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub written: usize,
    pub skipped: usize,
}

/// `images-{unix_millis}.zip`
pub fn default_archive_name(now: DateTime<Utc>) -> String {
    format!("images-{}.zip", now.timestamp_millis())
}

/// Make names unique by suffixing repeats with `-2`, `-3`, … before the extension.
pub fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used = HashSet::new();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();

    for name in names {
        let name = name.trim_matches('/');
        let name = if name.is_empty() { "image.jpg" } else { name };
        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => name.split_at(dot),
            _ => (name, ""),
        };

        let mut candidate = name.to_string();
        let counter = counters.entry(name.to_lowercase()).or_insert(1);
        while !used.insert(candidate.to_lowercase()) {
            *counter += 1;
            candidate = format!("{stem}-{counter}{ext}");
        }
        out.push(candidate);
    }
    out
}

/// Write `entries` into a ZIP archive, returning the underlying writer.
pub fn write_zip<W: Write + Seek>(writer: W, entries: &[ArchiveEntry]) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let names = unique_names(entries.iter().map(|e| e.name.as_str()));
    for (entry, name) in entries.iter().zip(names) {
        zip.start_file(name, options)?;
        zip.write_all(&entry.bytes)?;
    }

    Ok(zip.finish()?)
}

/// Write `entries` to a new file at `path`. A partially written file is removed on failure.
pub fn save_zip(path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let written = write_zip(file, entries).map(drop);
    discard_on_error(path, written)
}

fn discard_on_error(path: &Path, result: Result<()>) -> Result<()> {
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove incomplete archive");
        }
    }
    result
}

/// Downloads images and saves them as one archive.
pub struct ZipDownloader {
    client: reqwest::Client,
}

impl ZipDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch(&self, image: &ImageRecord) -> Result<ArchiveEntry> {
        let resp = self.client.get(&image.src).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: format!("Failed to fetch {}", image.name),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(ArchiveEntry {
            name: image.name.clone(),
            bytes: bytes.to_vec(),
        })
    }

    /// Fetch every image concurrently. Failed fetches are logged and left out.
    pub async fn fetch_all(&self, images: &[&ImageRecord]) -> (Vec<ArchiveEntry>, usize) {
        let results = join_all(images.iter().map(|image| self.fetch(image))).await;

        let mut entries = Vec::new();
        let mut skipped = 0;
        for (image, result) in images.iter().zip(results) {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(src = %image.src, error = %e, "skipping image that failed to download");
                    skipped += 1;
                }
            }
        }
        (entries, skipped)
    }

    /// Download the records whose ids are in `selected` and write them to `path`.
    pub async fn download(
        &self,
        images: &[ImageRecord],
        selected: &HashSet<u32>,
        path: &Path,
    ) -> Result<ArchiveSummary> {
        let chosen: Vec<&ImageRecord> = images.iter().filter(|i| selected.contains(&i.id)).collect();
        let (entries, skipped) = self.fetch_all(&chosen).await;
        let written = entries.len();

        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || save_zip(&target, &entries))
        .await
        .map_err(|e| ClientError::Archive(e.to_string()))??;

        info!(path = %path.display(), written, skipped, "archive saved");
        Ok(ArchiveSummary {
            path: path.to_path_buf(),
            written,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use chrono::TimeZone;
    use zip::ZipArchive;

    use super::*;

    #[test]
    fn archive_name_uses_millis() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(default_archive_name(now), "images-1700000000123.zip");
    }

    #[test]
    fn repeated_names_get_suffixes() {
        let names = unique_names(["cat.jpg", "dog.png", "cat.jpg", "CAT.jpg", "README", "README", ""]);
        assert_eq!(
            names,
            vec!["cat.jpg", "dog.png", "cat-2.jpg", "CAT-3.jpg", "README", "README-2", "image.jpg"]
        );
    }

    #[test]
    fn suffix_skips_names_already_taken() {
        let names = unique_names(["a-2.jpg", "a.jpg", "a.jpg"]);
        assert_eq!(names, vec!["a-2.jpg", "a.jpg", "a-3.jpg"]);
    }

    #[test]
    fn zip_round_trip() {
        let entries = vec![
            ArchiveEntry { name: "a.jpg".into(), bytes: b"first".to_vec() },
            ArchiveEntry { name: "a.jpg".into(), bytes: b"second".to_vec() },
            ArchiveEntry { name: "b.png".into(), bytes: vec![0u8; 1024] },
        ];
        let cursor = write_zip(Cursor::new(Vec::new()), &entries).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 3);

        let mut contents = String::new();
        archive.by_name("a-2.jpg").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "second");

        let mut bytes = Vec::new();
        archive.by_name("b.png").unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 1024);
    }

    #[test]
    fn saved_archive_readable_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.zip");
        let entries = vec![ArchiveEntry { name: "a.jpg".into(), bytes: b"jpeg".to_vec() }];

        save_zip(&path, &entries).unwrap();

        let archive = ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn failed_write_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.zip");
        std::fs::write(&path, b"PK half").unwrap();

        let result = discard_on_error(&path, Err(ClientError::Archive("disk full".into())));

        assert!(matches!(result, Err(ClientError::Archive(_))));
        assert!(!path.exists());
    }

    #[test]
    fn successful_write_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.zip");
        std::fs::write(&path, b"PK").unwrap();

        discard_on_error(&path, Ok(())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_archive_is_valid() {
        let cursor = write_zip(Cursor::new(Vec::new()), &[]).unwrap();
        let archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
