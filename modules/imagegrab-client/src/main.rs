//! Command-line front end for the imagegrab scrape API.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use imagegrab_client::api::DEFAULT_REQUEST_TIMEOUT;
use imagegrab_client::archive::{default_archive_name, DEFAULT_FETCH_TIMEOUT};
use imagegrab_client::queue::DEFAULT_CONCURRENCY;
use imagegrab_client::{ApiClient, BatchAdmission, RequestQueue, Scanner, ZipDownloader};
use imagegrab_common::filter::default_selection;
use imagegrab_common::url_guard::{parse_urls_from_input, validate_urls, DEFAULT_MAX_BATCH_URLS};
use imagegrab_common::{filter_images, format_stats, sort_images, BatchUrlState, FilterCriteria, ImageRecord, SortOrder};

#[derive(Parser)]
#[command(name = "imagegrab")]
#[command(about = "Extract image URLs from web pages and optionally bundle them into a ZIP")]
#[command(version)]
struct Cli {
    /// Page URLs to scan
    urls: Vec<String>,

    /// Additional URLs as free-form text (newline or comma separated)
    #[arg(short, long)]
    input: Option<String>,

    /// Base URL of the imagegrab API
    #[arg(long, env = "IMAGEGRAB_API_URL", default_value = "http://localhost:3000")]
    api: String,

    /// Ask the backend for a deeper crawl
    #[arg(long)]
    deep: bool,

    /// Maximum concurrent extraction calls
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Whether batch calls wait for queue capacity (queued) or all start at once (unbounded)
    #[arg(long, default_value = "queued")]
    batch_admission: BatchAdmission,

    /// Maximum URLs accepted per run
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_URLS)]
    max_urls: usize,

    /// Keep only these formats (e.g. PNG); repeatable
    #[arg(short, long = "format")]
    formats: Vec<String>,

    /// Drop images narrower than this many pixels (unknown widths are kept)
    #[arg(long, default_value_t = 0)]
    min_width: u32,

    /// Keep only images found on these page URLs; repeatable
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Sort order: size, name or dimensions
    #[arg(long, default_value = "size")]
    sort: SortOrder,

    /// Save the images into a ZIP archive (default name images-<millis>.zip)
    #[arg(long, num_args = 0..=1)]
    zip: Option<Option<PathBuf>>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn collect_urls(cli: &Cli) -> Vec<String> {
    let mut text = cli.urls.join("\n");
    if let Some(input) = &cli.input {
        text.push('\n');
        text.push_str(input);
    }
    parse_urls_from_input(&text, cli.max_urls)
}

async fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("imagegrab=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let partition = validate_urls(&collect_urls(&cli));
    for invalid in &partition.invalid {
        warn!(url = %invalid, "skipping invalid URL");
    }
    if partition.valid.is_empty() {
        bail!("no valid URLs to scan");
    }
    // Page URLs are compared in the same normalized form the scan tagged them with.
    let sources = validate_urls(&cli.sources);
    if let Some(bad) = sources.invalid.first() {
        bail!("invalid --source URL: {bad}");
    }

    let client = ApiClient::new(&cli.api, DEFAULT_REQUEST_TIMEOUT)?;
    let queue = RequestQueue::new(cli.concurrency);
    let scanner = Scanner::new(Arc::new(client), queue)
        .with_admission(cli.batch_admission)
        .with_deep_scrape(cli.deep);

    let (progress, updates) = watch::channel(Vec::<BatchUrlState>::new());
    let reporter = tokio::spawn(report_progress(updates));

    let outcome = scanner.scan_observed(&partition.valid, &progress).await;
    drop(progress);
    let _ = reporter.await;

    if let Some(error) = outcome.error() {
        bail!("{error}");
    }
    info!("{}", outcome.summary());

    let criteria = FilterCriteria::default()
        .with_formats(&cli.formats)
        .with_min_width(cli.min_width)
        .with_source_urls(sources.valid);
    let mut visible: Vec<ImageRecord> = filter_images(&outcome.images, &criteria)
        .into_iter()
        .cloned()
        .collect();
    sort_images(&mut visible, cli.sort);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&visible)?);
    } else {
        print_table(&visible);
    }

    if let Some(zip) = cli.zip {
        let path = zip.unwrap_or_else(|| PathBuf::from(default_archive_name(chrono::Utc::now())));
        let downloader = ZipDownloader::new(DEFAULT_FETCH_TIMEOUT)?;
        let summary = downloader
            .download(&visible, &default_selection(&visible), &path)
            .await?;
        println!(
            "Saved {} image(s) to {} ({} failed)",
            summary.written,
            summary.path.display(),
            summary.skipped
        );
    }

    Ok(())
}

/// Log each URL's status transition and queue position until the sender is dropped.
async fn report_progress(mut updates: watch::Receiver<Vec<BatchUrlState>>) {
    let mut last: Vec<BatchUrlState> = Vec::new();
    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();
        for state in &current {
            let prior = last.iter().find(|s| s.url == state.url);
            if prior.map(|s| s.status) != Some(state.status) {
                info!(url = %state.url, status = %state.status, images = state.image_count, "progress");
            }
            if let Some(position) = state.queue_position {
                if prior.and_then(|s| s.queue_position) != Some(position) {
                    info!(url = %state.url, position, "waiting in queue");
                }
            }
        }
        last = current;
    }
}

fn print_table(images: &[ImageRecord]) {
    let stats = format_stats(images);
    let formats: Vec<String> = stats
        .formats
        .iter()
        .map(|(format, count)| format!("{format}: {count}"))
        .collect();
    println!("{} image(s) [{}]", stats.total_count, formats.join(", "));

    for image in images {
        println!(
            "{:>4}  {:<40}  {:>11}  {}",
            image.id,
            image.name,
            image.dimensions.to_string(),
            image.src
        );
    }
}
