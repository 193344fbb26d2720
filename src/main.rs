//! Clan War Archiver main entry point
//!
//! This is the command-line interface for the war crawler and live war monitor.

use clanwar_archiver::api::{ApiClient, HttpApiClient};
use clanwar_archiver::config::{load_config_with_hash, Config};
use clanwar_archiver::crawler::{Coordinator, RequestLimiter};
use clanwar_archiver::monitor::{LiveWarMonitor, MonitorSettings};
use clanwar_archiver::notify::build_sink;
use clanwar_archiver::storage::{SqliteStorage, Storage};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Clan War Archiver: discovers clans and archives their wars
///
/// Walks the clan tag space through the game-data API, archives every
/// finished war it can see, and optionally watches one clan's current war
/// to remind members before it starts.
#[derive(Parser, Debug)]
#[command(name = "clanwar-archiver")]
#[command(version = "1.0.0")]
#[command(about = "War discovery and archival for clan tags", long_about = None)]
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

    /// Clear the brute-force cursor so enumeration restarts from the first tag, then exit
    #[arg(long)]
    reset_cursor: bool,

    /// Move failed tags back to pending, then exit
    #[arg(long)]
    requeue_failed: bool,

    /// Run the crawler without the live war monitor
    #[arg(long, conflicts_with = "monitor_only")]
    crawl_only: bool,

    /// Run the live war monitor without the crawler
    #[arg(long, conflicts_with = "crawl_only")]
    monitor_only: bool,

    /// Validate config and show the effective settings without contacting the API
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
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

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.reset_cursor || cli.requeue_failed {
        handle_operator_actions(&config, cli.reset_cursor, cli.requeue_failed)?;
    } else {
        handle_run(config, !cli.monitor_only, !cli.crawl_only).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("clanwar_archiver=info,warn"),
            1 => EnvFilter::new("clanwar_archiver=debug,info"),
            2 => EnvFilter::new("clanwar_archiver=trace,debug"),
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

fn open_storage(config: &Config) -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    Ok(Arc::new(storage))
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Clan War Archiver Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Token: {} characters", config.api.token.len());
    println!("  Timeout: {}s", config.api.timeout_secs);
    println!(
        "  Rate limit: {} requests per {}s",
        config.api.requests_per_window, config.api.window_secs
    );

    println!("\nCrawler:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Queue capacity: {}", config.crawler.queue_capacity);
    println!(
        "  Tag lengths: {}-{}",
        config.crawler.min_length, config.crawler.max_length
    );
    println!("  Idle poll: {}ms", config.crawler.idle_poll_ms);
    println!(
        "  Max transient attempts: {}",
        config.crawler.max_transient_attempts
    );
    println!(
        "  Retry backoff: {}ms doubling up to {}ms",
        config.crawler.retry_backoff_ms, config.crawler.retry_backoff_max_ms
    );
    println!("  Progress every: {} tags", config.crawler.progress_every);
    println!("  Seed tags ({}):", config.crawler.seed_tags.len());
    for tag in &config.crawler.seed_tags {
        println!("    * {}", tag);
    }

    match &config.monitor {
        Some(monitor) => {
            println!("\nMonitor:");
            println!("  Clan: {}", monitor.clan_tag);
            println!("  Poll interval: {}s", monitor.poll_interval_secs);
            println!("  Lead window: {} minutes", monitor.lead_window_minutes);
            println!("  Recipients ({}):", monitor.recipients.len());
            for recipient in &monitor.recipients {
                println!("    * {}", recipient);
            }
        }
        None => println!("\nMonitor: disabled"),
    }

    println!("\nNotifications:");
    match &config.notify.webhook_url {
        Some(url) => println!("  Webhook: {}", url),
        None => println!("  Log only"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use clanwar_archiver::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(storage.as_ref())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --reset-cursor and --requeue-failed
fn handle_operator_actions(
    config: &Config,
    reset_cursor: bool,
    requeue_failed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(config)?;

    if reset_cursor {
        let previous = storage.get_cursor()?;
        storage.reset_cursor()?;
        println!(
            "✓ Cursor reset (was {})",
            previous.as_deref().unwrap_or("unset")
        );
    }

    if requeue_failed {
        let requeued = storage.requeue_failed()?;
        println!("✓ {} failed tags moved back to pending", requeued);
    }

    Ok(())
}

/// Handles the main operation: crawler and monitor side by side
async fn handle_run(
    config: Config,
    run_crawler: bool,
    run_monitor: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&config)?;
    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(&config.api)?);
    let limiter = Arc::new(RequestLimiter::from_config(&config.api)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, finishing in-flight work");
                shutdown_tx.send_replace(true);
            }
        });
    }

    let monitor_handle = match (&config.monitor, run_monitor) {
        (Some(monitor_config), true) => {
            let sink = build_sink(
                &config.notify,
                Duration::from_secs(config.api.timeout_secs),
            )?;
            let monitor = LiveWarMonitor::new(
                Arc::clone(&api),
                Arc::clone(&storage),
                sink,
                Arc::clone(&limiter),
                MonitorSettings::from_config(monitor_config)?,
            );
            Some(tokio::spawn(monitor.run(shutdown_rx.clone())))
        }
        (None, true) if !run_crawler => {
            return Err("--monitor-only requires a [monitor] section".into());
        }
        _ => None,
    };

    let crawl_result = if run_crawler {
        let coordinator = Coordinator::new(
            config.crawler.clone(),
            Arc::clone(&api),
            Arc::clone(&storage),
            Arc::clone(&limiter),
            Arc::clone(&shutdown_tx),
        )?;
        let result = coordinator.run().await;

        // The monitor outlives a finished crawl only when the crawl stopped cleanly
        if result.is_err() {
            shutdown_tx.send_replace(true);
        }
        result.map(|_| ())
    } else {
        Ok(())
    };

    if let Some(handle) = monitor_handle {
        if let Err(e) = handle.await {
            tracing::error!("Live war monitor task failed: {}", e);
        }
    }

    match crawl_result {
        Ok(()) => {
            tracing::info!("Shut down cleanly");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
