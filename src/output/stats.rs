//! Statistics generation from the state database

use crate::state::DownloadStatus;
use crate::storage::StateStore;
use crate::HarvestError;
use std::collections::HashMap;

/// Download statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Total number of image URLs ever enqueued
    pub total: u64,

    /// Count of records by status
    pub by_status: HashMap<DownloadStatus, u64>,
}

impl HarvestStatistics {
    pub fn count(&self, status: DownloadStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The state store to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn StateStore) -> Result<HarvestStatistics, HarvestError> {
    let total = storage.count_total()?;

    let mut by_status = HashMap::new();
    for status in DownloadStatus::all() {
        by_status.insert(status, storage.count_by_status(status)?);
    }

    Ok(HarvestStatistics { total, by_status })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");
    println!("Total images tracked: {}", stats.total);
    println!();

    for status in DownloadStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total > 0 {
            (count as f64 / stats.total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {:<10} {:>6} ({:.1}%)", status, count, percentage);
    }
}
