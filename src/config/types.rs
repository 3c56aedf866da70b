use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the state database when `database-path` is not configured
pub const DEFAULT_DATABASE_FILE: &str = "scraper_state.db";

/// Main configuration structure for Page-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub output: OutputConfig,
}

/// Scraper behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// The page to harvest
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Number of download workers running in parallel
    #[serde(rename = "max-concurrent-downloads", default = "default_max_concurrent")]
    pub max_concurrent_downloads: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// User-Agent header sent with every request, if set
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for images, text, and (by default) the state database
    pub directory: String,

    /// Path to the SQLite state database
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

fn default_max_concurrent() -> u32 {
    10
}

fn default_request_timeout() -> u64 {
    20
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl OutputConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }

    /// Directory that downloaded images are written to
    pub fn images_dir(&self) -> PathBuf {
        self.root().join("images")
    }

    /// Directory holding the extracted page text
    pub fn text_dir(&self) -> PathBuf {
        self.root().join("text")
    }

    /// File the extracted page text is written to, overwritten each run
    pub fn text_path(&self) -> PathBuf {
        self.text_dir().join("content.txt")
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => PathBuf::from(path),
            None => self.root().join(DEFAULT_DATABASE_FILE),
        }
    }
}
