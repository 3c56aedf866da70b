/// Download status definitions for tracking image progress
///
/// A record is created as `Pending` and receives exactly one terminal update
/// per run, to `Completed` or `Failed`.
use std::fmt;

/// Represents the current status of an image download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    /// Discovered and waiting to be downloaded
    Pending,

    /// Downloaded and written to the images directory
    Completed,

    /// Download or write failed; stays failed until re-enqueued
    Failed,
}

impl DownloadStatus {
    /// Returns true if this status requires a filename on the record
    pub fn requires_filename(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 3] {
        [Self::Pending, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_db_string())
    }
}
