//! Harvester main entry point
//!
//! This is the command-line interface for the Harvester crawler.

use clap::{Parser, Subcommand};
use harvester::config::{load_config_with_hash, Config, FetcherConfig, HandlerKind, ScraperApiConfig};
use harvester::crawler::{run_crawl, HttpFetcher};
use harvester::dispatcher::DispatchSettings;
use harvester::download::{run_download, DownloadJob};
use harvester::frontier::FrontierState;
use harvester::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit status after an interrupt, as for a SIGINT-terminated process
const EXIT_INTERRUPTED: i32 = 130;

/// Harvester: a resumable sitemap and page crawler
///
/// Harvester walks sitemaps and pages through per-pattern handlers, stores
/// what it fetches under content addresses, and checkpoints its frontier so
/// an interrupted crawl resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(version)]
#[command(about = "A resumable sitemap and page crawler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl from the seeds and handlers of a configuration file
    Crawl {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Override a configuration value, e.g. --set frontier.max-pages=10
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Validate config and show what would be crawled without actually crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Download a flat list of URLs into a dump directory, with retries
    Download {
        /// File with one URL per line
        #[arg(long)]
        urls_file: PathBuf,

        /// Pending-task state, restored on start and saved on exit
        #[arg(long)]
        state_file: PathBuf,

        /// Directory receiving the artifacts and index.txt
        #[arg(long)]
        dump_dir: PathBuf,

        /// Route requests through the rendering proxy with this key
        #[arg(long)]
        scraper_api_key: Option<String>,

        /// Retries after the first attempt
        #[arg(long, default_value_t = 3)]
        num_retries: u32,

        /// Concurrent downloads
        #[arg(long, default_value_t = 5)]
        parallelism: usize,

        /// Upper bound for a single attempt, in seconds
        #[arg(long)]
        task_timeout_secs: Option<u64>,

        /// Wait before the first retry, in seconds; doubles per retry
        #[arg(long = "backoff-secs", value_name = "SECS", default_value = "1.0", value_parser = parse_secs)]
        backoff: Duration,

        /// Global request rate
        #[arg(long)]
        throttle_per_second: Option<f64>,
    },

    /// Print a summary of a frontier checkpoint file
    Inspect {
        #[arg(value_name = "STATE_FILE")]
        state_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Crawl {
            config,
            overrides,
            dry_run,
        } => handle_crawl(&config, &overrides, dry_run).await,
        Command::Download {
            urls_file,
            state_file,
            dump_dir,
            scraper_api_key,
            num_retries,
            parallelism,
            task_timeout_secs,
            backoff,
            throttle_per_second,
        } => {
            let job = DownloadJob {
                urls_file,
                state_file,
                dump_dir,
                settings: DispatchSettings {
                    num_retries,
                    parallelism,
                    task_timeout: task_timeout_secs.map(Duration::from_secs),
                    backoff_base: backoff,
                },
            };
            let fetcher_config = FetcherConfig {
                throttle_per_second,
                scraper_api: scraper_api_key.map(ScraperApiConfig::with_key),
                ..FetcherConfig::default()
            };
            handle_download(job, &fetcher_config).await
        }
        Command::Inspect { state_file } => handle_inspect(&state_file),
    };

    match result {
        Ok(()) => Ok(()),
        Err(HarvestError::Interrupted { processed }) => {
            tracing::warn!("Interrupted after {} items; state saved", processed);
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Parses a non-negative number of seconds that fits a [`Duration`]
fn parse_secs(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|e| format!("'{}' is not a number: {}", value, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{}' is not a valid duration: {}", value, e))
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("harvester=info,warn"),
            1 => EnvFilter::new("harvester=debug,info"),
            2 => EnvFilter::new("harvester=trace,debug"),
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

/// Resolves when Ctrl-C is pressed; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::warn!("Ctrl-C received; finishing in-flight work");
}

/// Directory that relative paths in a config file resolve against
fn config_base_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Handles the crawl command, or its --dry-run mode
async fn handle_crawl(path: &Path, overrides: &[String], dry_run: bool) -> Result<(), HarvestError> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path, overrides)?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let base_dir = config_base_dir(path);
    if dry_run {
        print_dry_run(&config, base_dir);
        return Ok(());
    }

    let report = run_crawl(config, base_dir, shutdown_signal()).await?;
    tracing::info!(
        "Crawl completed: {} processed, {} failed, {} discovered",
        report.processed,
        report.failed,
        report.discovered
    );
    Ok(())
}

/// Prints the validated configuration
fn print_dry_run(config: &Config, base_dir: &Path) {
    println!("=== Harvester Dry Run ===\n");

    println!("Frontier:");
    match &config.frontier.state_file {
        Some(file) => println!("  State file: {}", base_dir.join(file).display()),
        None => println!("  State file: none (crawl is not resumable)"),
    }
    match config.frontier.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    for (rank, pattern) in config.frontier.priorities.iter().enumerate() {
        println!("  Priority {}: {}", rank, pattern);
    }

    println!("\nCrawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!(
        "  Dump directory: {}",
        base_dir.join(&config.crawler.dump_dir).display()
    );

    println!("\nFetcher:");
    match config.fetcher.throttle_per_second {
        Some(rate) => println!("  Throttle: {} requests/sec", rate),
        None => println!("  Throttle: none"),
    }
    println!("  Request timeout: {}s", config.fetcher.request_timeout_secs);
    println!("  Headers: {}", config.fetcher.headers.len());
    if let Some(api) = &config.fetcher.scraper_api {
        println!("  Proxy: {} (render: {})", api.endpoint, api.render);
    }

    println!("\nHandlers ({}):", config.handlers.len());
    for entry in &config.handlers {
        let kind = match &entry.kind {
            HandlerKind::Sitemap { .. } => "sitemap",
            HandlerKind::ProductsGz { .. } => "products-gz",
            HandlerKind::Dump { .. } => "dump",
            HandlerKind::Links { .. } => "links",
        };
        println!("  - {} -> {}", entry.pattern, kind);
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the download command
async fn handle_download(job: DownloadJob, fetcher_config: &FetcherConfig) -> Result<(), HarvestError> {
    let fetcher = Arc::new(HttpFetcher::new(fetcher_config)?);
    let report = run_download(&job, fetcher, shutdown_signal()).await?;
    tracing::info!(
        "Download completed: {} stored, {} failed",
        report.succeeded,
        report.failed
    );
    Ok(())
}

/// Handles the inspect command
fn handle_inspect(path: &Path) -> Result<(), HarvestError> {
    let Some(state) = FrontierState::load(path)? else {
        println!("No checkpoint at {}", path.display());
        return Ok(());
    };

    println!("Checkpoint: {}\n", path.display());
    match state.saved_at {
        Some(saved_at) => println!("  Saved at: {}", saved_at.to_rfc3339()),
        None => println!("  Saved at: unknown"),
    }
    println!("  Processed: {}", state.processed_count);
    println!("  Seen: {}", state.added.len());
    println!("  Pending: {}", state.pending());
    for (rank, queue) in state.queues.iter().enumerate() {
        println!("    class {}: {}", rank, queue.len());
    }
    println!("  In flight: {}", state.in_flight.len());
    for url in &state.in_flight {
        println!("    * {}", url);
    }

    Ok(())
}
