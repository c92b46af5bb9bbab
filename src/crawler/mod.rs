//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP and `file://` fetching behind the [`Fetch`] trait
//! - Crawl-wide rate limiting
//! - HTML link extraction
//! - The crawl loop and overall crawl coordination

mod fetcher;
mod parser;
mod rate_limiter;
mod scheduler;

pub use fetcher::{build_http_client, Fetch, FetchError, FetchedPage, HttpFetcher, MAX_REDIRECTS};
pub use parser::extract_links;
pub use rate_limiter::RateLimiter;
pub use scheduler::{CrawlReport, Scheduler};

use crate::config::Config;
use crate::frontier::{CheckpointGuard, Frontier};
use crate::handlers::HandlerRegistry;
use crate::storage::ArtifactSink;
use crate::url::PriorityMatcher;
use crate::HarvestError;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the dump directory and compile the handlers
/// 2. Restore the frontier checkpoint, if any
/// 3. Add the seeds (already-seen seeds are skipped)
/// 4. Run the crawl loop until the frontier is inactive or `shutdown` resolves
/// 5. Write the checkpoint
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `base_dir` - Directory relative paths in the configuration resolve against
/// * `shutdown` - Resolves when the crawl should stop
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The frontier was exhausted or the budget reached
/// * `Err(HarvestError::Interrupted)` - `shutdown` fired; in-flight work
///   finished and the checkpoint was written
/// * `Err(HarvestError)` - Crawl failed
///
/// # Example
///
/// ```no_run
/// use harvester::config::load_config;
/// use harvester::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let shutdown = async {
///     let _ = tokio::signal::ctrl_c().await;
/// };
/// run_crawl(config, Path::new("."), shutdown).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl<S>(
    config: Config,
    base_dir: &Path,
    shutdown: S,
) -> Result<CrawlReport, HarvestError>
where
    S: Future<Output = ()>,
{
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    run_crawl_with(config, base_dir, fetcher, shutdown).await
}

/// [`run_crawl`] with a caller-supplied fetcher
pub async fn run_crawl_with<F, S>(
    config: Config,
    base_dir: &Path,
    fetcher: Arc<F>,
    shutdown: S,
) -> Result<CrawlReport, HarvestError>
where
    F: Fetch,
    S: Future<Output = ()>,
{
    let dump_dir = base_dir.join(&config.crawler.dump_dir);
    let sink = Arc::new(ArtifactSink::new(&dump_dir)?);
    let registry = Arc::new(HandlerRegistry::from_config(&config.handlers, sink)?);
    let matcher = PriorityMatcher::new(&config.frontier.priorities)?;
    let state_path = config
        .frontier
        .state_file
        .as_ref()
        .map(|file| base_dir.join(file));

    tracing::info!(
        "Crawl setup: {} handlers, {} priority classes, dump dir {}",
        registry.len(),
        matcher.class_count(),
        dump_dir.display()
    );

    let mut frontier = CheckpointGuard::open(
        Frontier::new(matcher, config.frontier.max_pages),
        state_path,
    )?;

    let seeded = config.seeds.iter().filter(|seed| frontier.add(seed)).count();
    tracing::info!("Seeded {} of {} URLs", seeded, config.seeds.len());

    let scheduler = Scheduler::new(fetcher, registry, config.crawler.concurrency);
    // On error the guard's Drop writes the checkpoint
    let report = scheduler.run(&mut frontier, shutdown).await?;
    let stats = frontier.close()?;

    if report.interrupted {
        return Err(HarvestError::Interrupted {
            processed: stats.processed,
        });
    }
    Ok(report)
}
