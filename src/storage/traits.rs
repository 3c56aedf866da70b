//! Storage traits and error types
//!
//! This module defines the trait interface for the state store and its
//! associated error types.

use crate::state::DownloadStatus;
use crate::storage::DownloadRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid record for {url}: {reason}")]
    InvalidRecord { url: String, reason: String },

    #[error("Unknown download status in database: {0}")]
    UnknownStatus(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of URL -> download status
///
/// Every method is one transaction. The store is the only writer of
/// download records; workers request transitions through `mark`.
pub trait StateStore {
    /// Ensures the backing schema exists. Idempotent.
    fn initialize(&mut self) -> StorageResult<()>;

    /// Inserts each URL as pending if it is not already known
    ///
    /// Existing records are left untouched (status and retries are not reset).
    ///
    /// # Returns
    ///
    /// The number of newly inserted records
    fn enqueue(&mut self, urls: &[String]) -> StorageResult<u64>;

    /// Returns every URL currently pending, in unspecified order
    fn pending_urls(&self) -> StorageResult<Vec<String>>;

    /// Records a status transition and refreshes the timestamp
    ///
    /// `filename` must be present exactly when `status` is `Completed`.
    /// Marking an unknown URL is logged and otherwise ignored.
    fn mark(
        &mut self,
        url: &str,
        status: DownloadStatus,
        filename: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a record by URL
    fn get_record(&self, url: &str) -> StorageResult<Option<DownloadRecord>>;

    /// Moves every failed record back to pending and bumps its retry counter
    ///
    /// # Returns
    ///
    /// The number of records re-enqueued
    fn requeue_failed(&mut self) -> StorageResult<u64>;

    /// Counts records in the given status
    fn count_by_status(&self, status: DownloadStatus) -> StorageResult<u64>;

    /// Counts all records
    fn count_total(&self) -> StorageResult<u64>;
}
