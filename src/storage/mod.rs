//! Storage module for persisting download progress
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent enqueueing of discovered image URLs
//! - Status transitions requested by download workers
//! - Re-enqueueing failed downloads and status counts

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{StateStore, StorageError, StorageResult};

use crate::state::DownloadStatus;
use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Storage with the schema ensured
/// * `Err(HarvestError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// One image URL's download lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub url: String,
    pub status: DownloadStatus,
    /// Set if and only if `status` is `Completed`
    pub filename: Option<String>,
    /// Number of times the record was re-enqueued after failing
    pub retries: u32,
    /// Last status transition, RFC 3339
    pub timestamp: String,
}
