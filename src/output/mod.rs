//! Output module for reporting harvest progress
//!
//! Reads the state store and summarizes how many images are pending,
//! downloaded, or failed.

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
