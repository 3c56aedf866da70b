//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StateStore trait.

use crate::state::DownloadStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use crate::storage::DownloadRecord;
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Opens (or creates) the database file and ensures the schema exists.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        let mut storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        let mut storage = Self { conn };
        storage.initialize()?;
        Ok(storage)
    }

    /// Raw connection, for tests that need to break the schema
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(DownloadRecord, String)> {
    let status: String = row.get(1)?;
    let record = DownloadRecord {
        url: row.get(0)?,
        // Placeholder until the status string is checked below
        status: DownloadStatus::Pending,
        filename: row.get(2)?,
        retries: row.get(3)?,
        timestamp: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    };
    Ok((record, status))
}

impl StateStore for SqliteStorage {
    fn initialize(&mut self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    fn enqueue(&mut self, urls: &[String]) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO download_records (url, status, timestamp) VALUES (?1, ?2, ?3)",
            )?;
            for url in urls {
                inserted +=
                    stmt.execute(params![url, DownloadStatus::Pending.to_db_string(), now])? as u64;
            }
        }
        tx.commit()?;

        tracing::debug!(
            "Enqueued {} URLs ({} new, {} already known)",
            urls.len(),
            inserted,
            urls.len() as u64 - inserted
        );
        Ok(inserted)
    }

    fn pending_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM download_records WHERE status = ?1")?;

        let urls = stmt
            .query_map(params![DownloadStatus::Pending.to_db_string()], |row| {
                row.get(0)
            })?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(urls)
    }

    fn mark(
        &mut self,
        url: &str,
        status: DownloadStatus,
        filename: Option<&str>,
    ) -> StorageResult<()> {
        if status.requires_filename() != filename.is_some() {
            return Err(StorageError::InvalidRecord {
                url: url.to_string(),
                reason: format!(
                    "status '{}' {} a filename",
                    status,
                    if status.requires_filename() {
                        "requires"
                    } else {
                        "must not carry"
                    }
                ),
            });
        }

        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE download_records SET status = ?1, filename = ?2, timestamp = ?3 WHERE url = ?4",
            params![status.to_db_string(), filename, now, url],
        )?;

        if updated == 0 {
            tracing::warn!("Tried to mark unknown URL {} as {}", url, status);
        }

        Ok(())
    }

    fn get_record(&self, url: &str) -> StorageResult<Option<DownloadRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT url, status, filename, retries, timestamp FROM download_records WHERE url = ?1",
                params![url],
                record_from_row,
            )
            .optional()?;

        match row {
            Some((mut record, status)) => {
                record.status = DownloadStatus::from_db_string(&status)
                    .ok_or(StorageError::UnknownStatus(status))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn requeue_failed(&mut self) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE download_records
             SET status = ?1, filename = NULL, retries = COALESCE(retries, 0) + 1, timestamp = ?2
             WHERE status = ?3",
            params![
                DownloadStatus::Pending.to_db_string(),
                now,
                DownloadStatus::Failed.to_db_string()
            ],
        )?;
        Ok(updated as u64)
    }

    fn count_by_status(&self, status: DownloadStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM download_records WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM download_records", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}
