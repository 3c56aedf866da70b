//! Database schema definitions
//!
//! This module contains the SQL schema for the Page-Harvest state database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per distinct image URL ever enqueued
CREATE TABLE IF NOT EXISTS download_records (
    url TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    filename TEXT,
    retries INTEGER DEFAULT 0,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_download_records_status ON download_records(status);
"#;

/// Initializes the database schema
///
/// Safe to run on every startup.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
