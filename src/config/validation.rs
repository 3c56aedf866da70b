use crate::config::types::{Config, OutputConfig, ScraperConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scraper configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.max_concurrent_downloads < 1 || config.max_concurrent_downloads > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_downloads must be between 1 and 100, got {}",
            config.max_concurrent_downloads
        )));
    }

    if config.request_timeout < 1 || config.request_timeout > 600 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be between 1 and 600 seconds, got {}",
            config.request_timeout
        )));
    }

    if let Some(user_agent) = &config.user_agent {
        validate_user_agent(user_agent)?;
    }

    Ok(())
}

/// A User-Agent must be representable as an HTTP header value
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be blank".to_string(),
        ));
    }

    if !user_agent.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
        return Err(ConfigError::Validation(format!(
            "user_agent must contain only printable ASCII characters, got '{}'",
            user_agent
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if matches!(&config.database_path, Some(path) if path.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
