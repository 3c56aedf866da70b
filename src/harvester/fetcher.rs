//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester:
//! - Building the shared HTTP client (timeout, optional User-Agent)
//! - Fetching the target page as text
//! - Fetching image bodies into memory together with their declared type

use crate::config::ScraperConfig;
use crate::harvester::worker::DownloadError;
use crate::HarvestError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

/// The harvested page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects, used as the base for relative references
    pub final_url: String,

    /// Page body
    pub body: String,
}

/// A fully buffered image response
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Response body
    pub body: Vec<u8>,

    /// Content-Type header value, if present and valid UTF-8
    pub content_type: Option<String>,
}

/// Builds the HTTP client shared by the page fetch and every worker
///
/// The configured timeout bounds each request as a whole. The User-Agent
/// header is only set when configured.
///
/// # Example
///
/// ```no_run
/// use page_harvest::config::ScraperConfig;
/// use page_harvest::harvester::build_http_client;
///
/// let config = ScraperConfig {
///     base_url: "https://example.com/".to_string(),
///     max_concurrent_downloads: 10,
///     request_timeout: 20,
///     user_agent: Some("HarvestBot/1.0".to_string()),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &ScraperConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(config.timeout())
        .gzip(true)
        .brotli(true);

    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }

    builder.build()
}

/// Fetches the target page
///
/// Any transport failure or non-2xx status is reported as
/// `HarvestError::PageFetch`, which aborts the run.
pub async fn fetch_page(client: &Client, url: &str) -> Result<FetchedPage, HarvestError> {
    let page_error = |source: reqwest::Error| HarvestError::PageFetch {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(page_error)?;

    let final_url = response.url().to_string();
    let body = response.text().await.map_err(page_error)?;

    Ok(FetchedPage { final_url, body })
}

/// Fetches one image into memory
///
/// # Error Classification
///
/// | Condition | Error |
/// |-----------|-------|
/// | Non-2xx status | `DownloadError::HttpStatus` |
/// | Connect failure, timeout, other transport error | `DownloadError::Network` |
/// | Body could not be read or decoded | `DownloadError::Decode` |
pub async fn fetch_image(client: &Client, url: &str) -> Result<FetchedImage, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(DownloadError::from_transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::HttpStatus(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response
        .bytes()
        .await
        .map_err(DownloadError::from_transport)?
        .to_vec();

    Ok(FetchedImage { body, content_type })
}
