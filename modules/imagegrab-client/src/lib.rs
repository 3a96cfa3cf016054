pub mod api;
pub mod archive;
pub mod batch;
pub mod error;
pub mod queue;

pub use api::{ApiClient, ImageExtractor};
pub use archive::{ArchiveSummary, ZipDownloader};
pub use batch::{BatchAdmission, ScanOutcome, Scanner};
pub use error::{ClientError, Result};
pub use queue::{QueueStats, RequestQueue, Slot, Ticket};
