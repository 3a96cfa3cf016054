//! Single and multi-URL scans.
//!
//! A single URL goes through the [`RequestQueue`] and keeps the server's
//! numbering. Several URLs fan out together; each URL's progress is
//! tracked on its own, a failing URL never stops the others, and once every
//! call has settled the images are merged in input order and deduplicated.

use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use imagegrab_common::{deduplicate, BatchStatus, BatchUrlState, DedupResult, ImageRecord};

use crate::api::ImageExtractor;
use crate::error::Result;
use crate::queue::{RequestQueue, Slot};

/// Whether batch calls wait for queue capacity like single scans do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchAdmission {
    /// Every call takes a queue slot.
    #[default]
    Queued,
    /// All calls start at once, bypassing the queue.
    Unbounded,
}

impl FromStr for BatchAdmission {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(BatchAdmission::Queued),
            "unbounded" => Ok(BatchAdmission::Unbounded),
            other => Err(format!("unknown batch admission '{other}' (expected queued or unbounded)")),
        }
    }
}

/// Result of a scan, single or batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub states: Vec<BatchUrlState>,
    pub images: Vec<ImageRecord>,
    pub duplicates_removed: usize,
}

impl ScanOutcome {
    pub fn succeeded(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.status == BatchStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchUrlState> {
        self.states.iter().filter(|s| s.status == BatchStatus::Failed)
    }

    /// First error message, for scans where nothing succeeded.
    pub fn error(&self) -> Option<&str> {
        if self.succeeded() > 0 {
            return None;
        }
        self.failed().find_map(|s| s.error.as_deref())
    }

    /// One-line status such as `Found 12 images from 2 URLs (3 duplicates removed)`.
    pub fn summary(&self) -> String {
        let images = self.images.len();
        let mut line = format!("Found {images} image{}", plural(images));
        if self.states.len() > 1 {
            let urls = self.succeeded();
            line.push_str(&format!(" from {urls} URL{}", plural(urls)));
        }
        if self.duplicates_removed > 0 {
            let dups = self.duplicates_removed;
            line.push_str(&format!(" ({dups} duplicate{} removed)", plural(dups)));
        }
        line
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub struct Scanner {
    extractor: Arc<dyn ImageExtractor>,
    queue: RequestQueue,
    admission: BatchAdmission,
    deep_scrape: bool,
}

impl Scanner {
    pub fn new(extractor: Arc<dyn ImageExtractor>, queue: RequestQueue) -> Self {
        Self {
            extractor,
            queue,
            admission: BatchAdmission::default(),
            deep_scrape: false,
        }
    }

    pub fn with_admission(mut self, admission: BatchAdmission) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_deep_scrape(mut self, deep_scrape: bool) -> Self {
        self.deep_scrape = deep_scrape;
        self
    }

    /// One queued extraction call for `url`, tagged with the page it came from.
    pub async fn scan_single(&self, url: &str) -> ScanOutcome {
        let (progress, _) = watch::channel(vec![BatchUrlState::pending(url)]);
        self.single_outcome(url, &progress).await
    }

    /// Route one URL through the single path and several through the batch path.
    pub async fn scan(&self, urls: &[String]) -> ScanOutcome {
        if let [url] = urls {
            return self.scan_single(url).await;
        }
        let (progress, _) = watch::channel(Vec::new());
        self.scan_observed(urls, &progress).await
    }

    /// Like [`Scanner::scan`], publishing per-URL progress on `progress` as it changes.
    /// Pending URLs carry their queue position while they wait for a slot.
    pub async fn scan_observed(
        &self,
        urls: &[String],
        progress: &watch::Sender<Vec<BatchUrlState>>,
    ) -> ScanOutcome {
        progress.send_replace(urls.iter().map(BatchUrlState::pending).collect());

        if let [url] = urls {
            return self.single_outcome(url, progress).await;
        }

        info!(urls = urls.len(), admission = ?self.admission, "starting batch scan");

        let queued = self.admission == BatchAdmission::Queued;
        let calls = urls
            .iter()
            .enumerate()
            .map(|(index, url)| self.extract_admitted(index, url, queued, progress));
        let results = join_all(calls).await;

        let mut merged = Vec::new();
        for (url, result) in urls.iter().zip(results) {
            if let Ok(images) = result {
                merged.extend(tag_source(images, url));
            }
        }

        let DedupResult {
            images,
            duplicates_removed,
        } = deduplicate(merged);

        let outcome = ScanOutcome {
            states: progress.borrow().clone(),
            images,
            duplicates_removed,
        };
        info!(
            images = outcome.images.len(),
            succeeded = outcome.succeeded(),
            duplicates_removed,
            "batch scan settled"
        );
        outcome
    }

    async fn single_outcome(
        &self,
        url: &str,
        progress: &watch::Sender<Vec<BatchUrlState>>,
    ) -> ScanOutcome {
        let images: Vec<ImageRecord> = self
            .extract_admitted(0, url, true, progress)
            .await
            .map(|images| tag_source(images, url).collect())
            .unwrap_or_default();

        ScanOutcome {
            states: progress.borrow().clone(),
            images,
            duplicates_removed: 0,
        }
    }

    /// Wait for a queue slot when `queued`, then run the tracked extraction while holding it.
    async fn extract_admitted(
        &self,
        index: usize,
        url: &str,
        queued: bool,
        progress: &watch::Sender<Vec<BatchUrlState>>,
    ) -> Result<Vec<ImageRecord>> {
        let _slot = if queued {
            Some(self.admit(index, progress).await)
        } else {
            None
        };
        self.extract_tracked(index, url, progress).await
    }

    async fn admit(&self, index: usize, progress: &watch::Sender<Vec<BatchUrlState>>) -> Slot {
        let mut changes = self.queue.subscribe();
        let ticket = self.queue.enqueue();

        loop {
            let position = ticket.position();
            progress.send_if_modified(|states| states[index].wait(position));
            let Some(position) = position else {
                break;
            };
            debug!(ticket = %ticket.id(), position, "waiting for a queue slot");
            if changes.changed().await.is_err() {
                break;
            }
        }
        ticket.admitted().await
    }

    async fn extract_tracked(
        &self,
        index: usize,
        url: &str,
        progress: &watch::Sender<Vec<BatchUrlState>>,
    ) -> Result<Vec<ImageRecord>> {
        progress.send_modify(|states| {
            states[index].start();
        });

        let result = self.extractor.extract(url, self.deep_scrape).await;

        progress.send_modify(|states| match &result {
            Ok(images) => {
                states[index].complete(images.len());
            }
            Err(e) => {
                warn!(url, error = %e, "scan failed");
                states[index].fail(e.to_string());
            }
        });
        result
    }
}

fn tag_source<'a>(images: Vec<ImageRecord>, url: &'a str) -> impl Iterator<Item = ImageRecord> + 'a {
    images.into_iter().map(move |mut image| {
        image.source_url = Some(url.to_string());
        image
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(states: Vec<BatchUrlState>, images: usize, dups: usize) -> ScanOutcome {
        ScanOutcome {
            states,
            images: (1..=images as u32)
                .map(|i| ImageRecord::new(i, format!("https://a.com/{i}.jpg"), format!("{i}.jpg")))
                .collect(),
            duplicates_removed: dups,
        }
    }

    fn done(url: &str, count: usize) -> BatchUrlState {
        let mut state = BatchUrlState::pending(url);
        state.start();
        state.complete(count);
        state
    }

    fn failed(url: &str, error: &str) -> BatchUrlState {
        let mut state = BatchUrlState::pending(url);
        state.start();
        state.fail(error);
        state
    }

    #[test]
    fn summary_single() {
        let o = outcome(vec![done("https://a.com", 1)], 1, 0);
        assert_eq!(o.summary(), "Found 1 image");
    }

    #[test]
    fn summary_batch_with_duplicates() {
        let o = outcome(
            vec![done("https://a.com", 3), failed("https://b.com", "x"), done("https://c.com", 2)],
            4,
            1,
        );
        assert_eq!(o.summary(), "Found 4 images from 2 URLs (1 duplicate removed)");
        assert_eq!(o.error(), None);
    }

    #[test]
    fn error_reported_when_nothing_succeeded() {
        let o = outcome(vec![failed("https://a.com", "Scraping failed")], 0, 0);
        assert_eq!(o.error(), Some("Scraping failed"));
    }

    #[test]
    fn admission_from_str() {
        assert_eq!("Queued".parse(), Ok(BatchAdmission::Queued));
        assert_eq!("unbounded".parse(), Ok(BatchAdmission::Unbounded));
        assert!("sometimes".parse::<BatchAdmission>().is_err());
    }
}
