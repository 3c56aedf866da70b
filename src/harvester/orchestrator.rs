//! Harvest orchestration
//!
//! Runs the linear pipeline:
//!
//! `fetch page -> extract -> persist text -> reconcile URLs -> drain queue -> shutdown`
//!
//! Only a failed page fetch aborts the run. Everything after that point
//! absorbs per-image failures into the state store.

use crate::config::Config;
use crate::extract::extract_content;
use crate::harvester::fetcher::{build_http_client, fetch_page};
use crate::harvester::queue::WorkQueue;
use crate::harvester::worker::{WorkerContext, WorkerPool, WorkerStats};
use crate::storage::{SqliteStorage, StateStore};
use crate::HarvestError;
use reqwest::Client;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Summary of one completed harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Characters of page text written to the text file
    pub text_chars: usize,

    /// Unique image URLs found on the page
    pub discovered: usize,

    /// Discovered URLs that were not yet known to the state store
    pub newly_queued: u64,

    /// URLs handed to the workers (new ones plus leftovers from earlier runs)
    pub pending: usize,

    /// Downloads that completed in this run
    pub completed: usize,

    /// Downloads that failed in this run
    pub failed: usize,
}

/// Creates the output root with its `images/` and `text/` subdirectories
///
/// Idempotent.
pub async fn prepare_output_dirs(config: &Config) -> Result<(), HarvestError> {
    tokio::fs::create_dir_all(config.output.images_dir()).await?;
    tokio::fs::create_dir_all(config.output.text_dir()).await?;

    if let Some(parent) = config.output.database_path().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    Ok(())
}

/// Main harvest coordinator
pub struct Harvester {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
}

impl Harvester {
    /// Creates a harvester, preparing output directories and opening the state store
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - Directories, database, or HTTP client could not be set up
    pub async fn new(config: Arc<Config>) -> Result<Self, HarvestError> {
        prepare_output_dirs(&config).await?;

        let storage = SqliteStorage::new(&config.output.database_path())?;
        let client = build_http_client(&config.scraper)?;

        Ok(Self {
            config,
            storage: Arc::new(Mutex::new(storage)),
            client,
        })
    }

    /// Shared handle to the state store
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    /// Runs one harvest
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The page was fetched and every pending image processed
    /// * `Err(HarvestError::PageFetch)` - The page could not be fetched; nothing was written
    /// * `Err(HarvestError)` - Writing the text file or the state store failed
    pub async fn run(&self) -> Result<RunReport, HarvestError> {
        let base_url = &self.config.scraper.base_url;
        tracing::info!("Fetching page: {}", base_url);

        let page = match fetch_page(&self.client, base_url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Aborting run: {}", e);
                return Err(e);
            }
        };

        let page_url = Url::parse(&page.final_url)?;
        let content = extract_content(&page.body, &page_url);

        let mut report = RunReport {
            text_chars: content.text.chars().count(),
            discovered: content.image_urls.len(),
            ..RunReport::default()
        };

        let text_path = self.config.output.text_path();
        tokio::fs::write(&text_path, content.text.as_bytes()).await?;
        tracing::info!(
            "Saved {} characters of text to {}",
            report.text_chars,
            text_path.display()
        );

        let discovered: Vec<String> = content.image_urls.into_iter().collect();
        let pending = {
            let mut storage = self.lock_storage();
            report.newly_queued = storage.enqueue(&discovered)?;
            storage.pending_urls()?
        };
        report.pending = pending.len();

        tracing::info!(
            "Found {} image URLs ({} new), {} pending download",
            report.discovered,
            report.newly_queued,
            report.pending
        );

        if pending.is_empty() {
            tracing::info!("No images to download");
            return Ok(report);
        }

        let stats = self.drain(pending).await;
        report.completed = stats.completed();
        report.failed = stats.failed();

        tracing::info!(
            "Harvest finished: {} downloaded, {} failed",
            report.completed,
            report.failed
        );

        Ok(report)
    }

    /// Feeds `urls` to a fresh worker pool and waits until all are processed
    async fn drain(&self, urls: Vec<String>) -> Arc<WorkerStats> {
        let queue = Arc::new(WorkQueue::new());
        for url in urls {
            queue.put(url);
        }

        let stats = Arc::new(WorkerStats::default());
        let ctx = Arc::new(WorkerContext::new(
            self.client.clone(),
            Arc::clone(&queue),
            Arc::clone(&self.storage),
            self.config.output.images_dir(),
            Arc::clone(&stats),
        ));

        let workers = self.config.scraper.max_concurrent_downloads as usize;
        tracing::info!(
            "Downloading {} images with {} workers",
            queue.len(),
            workers
        );

        let pool = WorkerPool::start(workers, ctx);
        queue.join().await;
        pool.shutdown().await;

        stats
    }

    fn lock_storage(&self) -> std::sync::MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs a complete harvest with the given configuration
///
/// # Example
///
/// ```no_run
/// use page_harvest::config::load_config;
/// use page_harvest::harvester::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_harvest(config).await?;
/// println!("{} images downloaded", report.completed);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<RunReport, HarvestError> {
    let harvester = Harvester::new(Arc::new(config)).await?;
    harvester.run().await
}
