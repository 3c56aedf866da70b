use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment variables (`BASE_URL`, `OUTPUT_DIR`, `DB_PATH`,
/// `MAX_CONCURRENT_DOWNLOADS`, `USER_AGENT`) override the file's values.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use page_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Workers: {}", config.scraper.max_concurrent_downloads);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parses configuration text, applies overrides from `lookup`, and validates
pub fn parse_config<F>(content: &str, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = toml::from_str(content)?;
    apply_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Applies environment-style overrides on top of a parsed configuration
///
/// Empty values are ignored. A numeric override that does not parse is a
/// validation error rather than being silently dropped.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(base_url) = get("BASE_URL") {
        config.scraper.base_url = base_url;
    }

    if let Some(directory) = get("OUTPUT_DIR") {
        config.output.directory = directory;
    }

    if let Some(database_path) = get("DB_PATH") {
        config.output.database_path = Some(database_path);
    }

    if let Some(raw) = get("MAX_CONCURRENT_DOWNLOADS") {
        config.scraper.max_concurrent_downloads = raw.trim().parse().map_err(|_| {
            ConfigError::Validation(format!(
                "MAX_CONCURRENT_DOWNLOADS must be a positive integer, got '{}'",
                raw
            ))
        })?;
    }

    if let Some(user_agent) = get("USER_AGENT") {
        config.scraper.user_agent = Some(user_agent);
    }

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be matched to the settings they used.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
