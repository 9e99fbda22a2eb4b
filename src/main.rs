//! ASN Harvest main entry point
//!
//! This is the command-line interface for the ASN Harvest year crawler.

use anyhow::Context;
use asn_harvest::config::{load_config_with_hash, Config};
use asn_harvest::crawler::Coordinator;
use asn_harvest::output::{
    load_statistics, print_discovery_report, print_statistics, print_summary,
};
use asn_harvest::storage::open_store;
use asn_harvest::url::SourceUrls;
use asn_harvest::HarvestError;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// ASN Harvest: a resumable crawler for the Aviation Safety Network database
///
/// Crawls one calendar year of accident records, scores each record's
/// extraction quality, and writes a validated CSV dataset. Progress is kept
/// in SQLite so an interrupted crawl picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "asn-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable ASN accident crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Year to crawl
    #[arg(short, long, value_parser = clap::value_parser!(i32).range(1900..=2100))]
    year: i32,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Forget stored progress for the year before crawling
    #[arg(long, conflicts_with_all = ["analyze", "stats", "dry_run"])]
    fresh: bool,

    /// Only walk the listing pages and report how many records exist
    #[arg(long, conflicts_with_all = ["stats", "dry_run"])]
    analyze: bool,

    /// Show stored progress for the year and exit
    #[arg(long, conflicts_with_all = ["analyze", "dry_run"])]
    stats: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["analyze", "stats"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.year)
    } else if cli.stats {
        handle_stats(&config, cli.year)
    } else if cli.analyze {
        handle_analyze(config, cli.year).await
    } else {
        handle_crawl(config, config_hash, cli.year, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("asn_harvest=info,warn"),
            1 => EnvFilter::new("asn_harvest=debug,info"),
            2 => EnvFilter::new("asn_harvest=trace,debug"),
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

/// Cancels the returned token on the first Ctrl-C
fn install_ctrl_c_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping the crawl");
            handler_token.cancel();
        }
    });
    token
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, year: i32) -> anyhow::Result<()> {
    let urls = SourceUrls::new(&config.source)?;
    let first_page = urls.listing_url(year, 1)?;

    println!("=== ASN Harvest Dry Run ===\n");

    println!("Source:");
    println!("  Base URL: {}", config.source.base_url);
    println!("  First listing page: {}", first_page);

    println!("\nFetcher:");
    println!(
        "  Timeout: {}s (connect {}s)",
        config.fetcher.timeout_secs, config.fetcher.connect_timeout_secs
    );
    println!(
        "  Attempts: {} (backoff {}-{}ms, jitter {}%)",
        config.fetcher.max_attempts,
        config.fetcher.retry_base_delay_ms,
        config.fetcher.retry_max_delay_ms,
        config.fetcher.retry_jitter_percent
    );

    println!("\nRate Limit:");
    if config.rate_limit.enabled {
        println!(
            "  Listing pages: {}-{}ms",
            config.rate_limit.listing_delay_min_ms, config.rate_limit.listing_delay_max_ms
        );
        println!(
            "  Records: {}-{}ms",
            config.rate_limit.record_delay_min_ms, config.rate_limit.record_delay_max_ms
        );
        println!("  Minimum interval: {}ms", config.rate_limit.min_interval_ms);
    } else {
        println!("  Disabled");
    }

    println!("\nCrawler:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Max listing pages: {}", config.crawler.max_pages);
    println!("  CSV flush interval: {}", config.crawler.csv_flush_interval);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} starting at {}", year, first_page);

    Ok(())
}

/// Handles the --stats mode: shows stored progress for a year
fn handle_stats(config: &Config, year: i32) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .context("Failed to open progress database")?;
    let stats = load_statistics(&store, year)?;
    print_statistics(&stats);

    store.close()?;
    Ok(())
}

/// Handles the --analyze mode: discovery only
async fn handle_analyze(config: Config, year: i32) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(config, false)
        .context("Failed to initialize crawler")?
        .with_cancellation(install_ctrl_c_handler());

    let result = coordinator.analyze(year).await;
    coordinator.close()?;

    let report = result.with_context(|| format!("Analysis of {} failed", year))?;
    print_discovery_report(&report);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    year: i32,
    fresh: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl of {} (ignoring stored progress)", year);
    } else {
        tracing::info!("Starting crawl of {} (resuming stored progress)", year);
    }

    let mut coordinator = Coordinator::new(config, fresh)
        .context("Failed to initialize crawler")?
        .with_config_hash(config_hash)
        .with_cancellation(install_ctrl_c_handler());

    let result = coordinator.scrape_year(year).await;
    coordinator.close()?;

    match result {
        Ok(outcome) => {
            print_summary(&outcome.summary);
            Ok(())
        }
        Err(HarvestError::Cancelled { year }) => {
            tracing::warn!("Crawl of {} interrupted; rerun to resume", year);
            Err(HarvestError::Cancelled { year }.into())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("Crawl of {} failed", year))),
    }
}
