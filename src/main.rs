//! Page-Harvest main entry point
//!
//! This is the command-line interface for the Page-Harvest scraper.

use anyhow::Context;
use clap::Parser;
use page_harvest::config::{load_config_with_hash, Config};
use page_harvest::harvester::Harvester;
use page_harvest::output::{load_statistics, print_statistics};
use page_harvest::storage::{open_storage, StateStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Page-Harvest: a resumable single-page scraper
///
/// Fetches one page, saves its text, and downloads every image it references.
/// Progress is kept in a SQLite database, so an interrupted run picks up the
/// remaining images the next time it is started.
#[derive(Parser, Debug)]
#[command(name = "page-harvest")]
#[command(version)]
#[command(about = "A resumable single-page scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without harvesting
    #[arg(long, conflicts_with_all = ["stats", "retry_failed"])]
    dry_run: bool,

    /// Show download statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "retry_failed"])]
    stats: bool,

    /// Re-enqueue previously failed downloads before harvesting
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    retry_failed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.stats {
        handle_stats(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_harvest(config, cli.retry_failed).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_harvest=info,warn"),
            1 => EnvFilter::new("page_harvest=debug,info"),
            2 => EnvFilter::new("page_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Page-Harvest Dry Run ===\n");

    println!("Scraper:");
    println!("  Base URL: {}", config.scraper.base_url);
    println!(
        "  Max concurrent downloads: {}",
        config.scraper.max_concurrent_downloads
    );
    println!("  Request timeout: {}s", config.scraper.request_timeout);
    println!(
        "  User-Agent: {}",
        config.scraper.user_agent.as_deref().unwrap_or("(client default)")
    );

    println!("\nOutput:");
    println!("  Images: {}", config.output.images_dir().display());
    println!("  Text: {}", config.output.text_path().display());
    println!("  Database: {}", config.output.database_path().display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.output.database_path();
    println!("Database: {}\n", path.display());

    let storage = open_storage(&path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
///
/// Exits non-zero when the run was aborted before any download work began.
async fn handle_harvest(config: Config, retry_failed: bool) -> anyhow::Result<ExitCode> {
    let harvester = Harvester::new(Arc::new(config)).await?;

    if retry_failed {
        let storage = harvester.storage();
        let requeued = storage
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?
            .requeue_failed()?;
        tracing::info!("Re-enqueued {} failed downloads", requeued);
    }

    match harvester.run().await {
        Ok(report) => {
            tracing::info!(
                "Run complete: {} discovered, {} downloaded, {} failed",
                report.discovered,
                report.completed,
                report.failed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("Harvest aborted: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
