//! State module for tracking download progress
//!
//! `DownloadStatus` is the lifecycle of one image URL: pending, then completed
//! or failed. The storage layer persists it; workers request transitions.

mod download_status;

pub use download_status::DownloadStatus;
