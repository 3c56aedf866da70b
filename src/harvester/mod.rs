//! Harvester module: the concurrent download pipeline
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching of the page and its images
//! - The FIFO work queue feeding the download workers
//! - File type sniffing and URL-derived filenames
//! - The fixed-size worker pool
//! - Overall run orchestration

mod fetcher;
mod orchestrator;
mod queue;
mod sniff;
mod worker;

pub use fetcher::{build_http_client, fetch_image, fetch_page, FetchedImage, FetchedPage};
pub use orchestrator::{prepare_output_dirs, run_harvest, Harvester, RunReport};
pub use queue::{QueueError, WorkQueue};
pub use sniff::{
    extension_from_mime, filename_for, infer_extension, sniff_image_mime, FALLBACK_EXTENSION,
    SNIFF_LEN,
};
pub use worker::{
    download_image, DownloadError, DownloadFn, DownloadFuture, WorkerContext, WorkerPool,
    WorkerStats,
};
