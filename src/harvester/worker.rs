//! Download workers
//!
//! Each worker loops: take a URL from the work queue, download it, write the
//! file, record the outcome in the state store, acknowledge the item. A
//! failure only ever affects the item being processed; the worker moves on
//! to the next URL. Cancellation is observed only while waiting for the next
//! URL, so an item that has been taken is always finished and recorded.

use crate::harvester::fetcher::fetch_image;
use crate::harvester::queue::WorkQueue;
use crate::harvester::sniff::{filename_for, infer_extension};
use crate::state::DownloadStatus;
use crate::storage::{SqliteStorage, StateStore};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Every way a single download can fail
///
/// All variants end in the record being marked `failed`; none of them stops
/// the worker.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("server responded with HTTP {0}")]
    HttpStatus(u16),

    #[error("failed to read response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// Classifies a reqwest error as a transport or body failure
    ///
    /// Timeouts count as network failures even when they hit mid-body.
    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Network(error)
        } else if error.is_body() || error.is_decode() {
            Self::Decode(error)
        } else {
            Self::Network(error)
        }
    }

    /// Short label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::HttpStatus(_) => "http_status",
            Self::Decode(_) => "decode",
            Self::Filesystem { .. } => "filesystem",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Downloads one image into `images_dir`
///
/// The filename is `<sha256(url)>.<ext>`, where the extension is inferred
/// from the body signature, then the Content-Type header, then `dat`.
///
/// # Returns
///
/// * `Ok(String)` - The filename written inside `images_dir`
/// * `Err(DownloadError)` - The download or the write failed
pub async fn download_image(
    client: &Client,
    url: &str,
    images_dir: &Path,
) -> Result<String, DownloadError> {
    let image = fetch_image(client, url).await?;

    let extension = infer_extension(&image.body, image.content_type.as_deref());
    let filename = filename_for(url, &extension);
    let path = images_dir.join(&filename);

    if let Err(source) = tokio::fs::write(&path, &image.body).await {
        return Err(DownloadError::Filesystem { path, source });
    }

    Ok(filename)
}

/// Outcome counters shared by all workers of a pool
#[derive(Debug, Default)]
pub struct WorkerStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl WorkerStats {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Future returned by a [`DownloadFn`]
pub type DownloadFuture = BoxFuture<'static, Result<String, DownloadError>>;

/// Performs one download and returns the written filename
///
/// Receives the shared client, the URL, and the images directory.
pub type DownloadFn = Arc<dyn Fn(Client, String, PathBuf) -> DownloadFuture + Send + Sync>;

fn default_download() -> DownloadFn {
    Arc::new(|client: Client, url: String, images_dir: PathBuf| {
        async move { download_image(&client, &url, &images_dir).await }.boxed()
    })
}

/// Resources shared by every worker
pub struct WorkerContext {
    pub client: Client,
    pub queue: Arc<WorkQueue>,
    pub storage: Arc<Mutex<SqliteStorage>>,
    pub images_dir: PathBuf,
    pub stats: Arc<WorkerStats>,
    download: DownloadFn,
}

impl WorkerContext {
    /// Creates a context whose workers fetch with [`download_image`]
    pub fn new(
        client: Client,
        queue: Arc<WorkQueue>,
        storage: Arc<Mutex<SqliteStorage>>,
        images_dir: PathBuf,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            client,
            queue,
            storage,
            images_dir,
            stats,
            download: default_download(),
        }
    }

    /// Replaces the per-item download step
    pub fn with_download(mut self, download: DownloadFn) -> Self {
        self.download = download;
        self
    }

    /// Downloads one URL and records the outcome. Never fails.
    async fn process(&self, worker: &str, url: &str) {
        let attempt = async {
            (self.download)(self.client.clone(), url.to_string(), self.images_dir.clone()).await
        };
        let result = AssertUnwindSafe(attempt)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(DownloadError::Unknown(panic_message(&*panic))));

        match result {
            Ok(filename) => {
                tracing::info!(
                    worker,
                    url,
                    filename = %filename,
                    status = "completed",
                    "Image downloaded"
                );
                self.record(worker, url, DownloadStatus::Completed, Some(&filename));
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                let message = match &error {
                    DownloadError::Network(_)
                    | DownloadError::HttpStatus(_)
                    | DownloadError::Decode(_) => "Download failed",
                    DownloadError::Filesystem { .. } => "Could not save image",
                    DownloadError::Unknown(_) => "Unexpected error while downloading",
                };
                tracing::error!(
                    worker,
                    url,
                    kind = error.kind(),
                    error = %error,
                    status = "failed",
                    "{}",
                    message
                );
                self.record(worker, url, DownloadStatus::Failed, None);
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn record(&self, worker: &str, url: &str, status: DownloadStatus, filename: Option<&str>) {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        match storage.mark(url, status, filename) {
            Ok(()) => tracing::debug!(worker, url, status = %status, "Status recorded"),
            Err(e) => {
                tracing::error!(worker, url, status = %status, error = %e, "Failed to record status")
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

async fn run_worker(name: String, ctx: Arc<WorkerContext>, cancel: CancellationToken) {
    tracing::debug!(worker = %name, "Worker started");

    loop {
        let url = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            url = ctx.queue.get() => url,
        };

        tracing::debug!(worker = %name, url = %url, "Took URL from queue");
        ctx.process(&name, &url).await;

        if let Err(e) = ctx.queue.mark_done() {
            tracing::error!(worker = %name, url = %url, error = %e, "Queue bookkeeping error");
        }
    }

    tracing::debug!(worker = %name, "Worker stopped");
}

/// Fixed-size set of download workers sharing one queue
pub struct WorkerPool {
    cancel: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Spawns `size` workers named `worker-1` .. `worker-N`
    pub fn start(size: usize, ctx: Arc<WorkerContext>) -> Self {
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();

        for i in 0..size {
            workers.spawn(run_worker(
                format!("worker-{}", i + 1),
                Arc::clone(&ctx),
                cancel.clone(),
            ));
        }

        tracing::debug!("Started {} download workers", size);
        Self { cancel, workers }
    }

    /// Number of workers still running
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Cancels all workers and waits for each to stop
    ///
    /// Workers stop at their next queue wait, so callers should `join` the
    /// queue first to let in-flight items finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task ended abnormally: {}", e);
            }
        }

        tracing::debug!("All download workers stopped");
    }
}
