pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod records;
pub mod types;
pub mod url_guard;

pub use config::Config;
pub use dedup::{deduplicate, DedupResult};
pub use error::ConfigError;
pub use filter::{filter_images, format_stats, sort_images, FormatStats, SortOrder};
pub use records::{extract_filename, images_from_urls};
pub use types::*;
pub use url_guard::{validate_url, NormalizationPolicy, UrlRejection, ValidatedUrl};
