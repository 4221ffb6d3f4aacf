//! Car-Harvest main entry point
//!
//! This is the command-line interface for the Car-Harvest catalog scraper.

use car_harvest::config::{load_config_with_hash, Config};
use car_harvest::crawler::run_scrape;
use car_harvest::output::{print_store_stats, print_summary};
use car_harvest::storage::{open_store, ListingStore};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Car-Harvest: a used-car catalog scraper
///
/// Car-Harvest walks every index page of the configured catalog, extracts one
/// record per listing and stores each listing once in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "car-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A used-car catalog scraper", long_about = None)]
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

    /// Validate config and show what would be scraped without sending requests
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_scrape(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("car_harvest=info,warn"),
            1 => EnvFilter::new("car_harvest=debug,info"),
            2 => EnvFilter::new("car_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config) {
    let scraper = &config.scraper;

    println!("=== Car-Harvest Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Catalog: {}", scraper.base_url);
    println!("  Page size: {}", scraper.page_size);
    match scraper.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: all"),
    }
    println!(
        "  Max concurrent requests: {}",
        scraper.max_concurrent_requests
    );
    println!(
        "  Timeouts: {}ms request, {}ms connect",
        scraper.request_timeout_ms, scraper.connect_timeout_ms
    );
    println!(
        "  Retries: {} (every {}ms)",
        scraper.max_retries, scraper.retry_delay_ms
    );
    println!("  Phone lookup: {}", scraper.resolve_phone_numbers);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nDatabase:");
    println!("  Path: {}", config.database.path);
    println!("  Pool size: {}", config.database.pool_size);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
async fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.database.path);

    let store = open_store(&config.database)?;
    let stats = store.stats().await?;
    print_store_stats(&stats);

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting scrape of {}", config.scraper.base_url);

    match run_scrape(config).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}
