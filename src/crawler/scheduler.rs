//! Crawl loop driving the frontier through fetchers and handlers
//!
//! This module handles:
//! - Sequential crawling (one URL at a time)
//! - Concurrent crawling over a bounded pool of spawned tasks
//! - Feeding discovered URLs back into the frontier
//! - Stopping cleanly on interrupt, after in-flight work has finished
//!
//! Worker tasks never touch the frontier. They return a [`Completion`] to the
//! loop, which is the only place the frontier is mutated.

use crate::crawler::fetcher::Fetch;
use crate::frontier::{Frontier, FrontierError};
use crate::handlers::HandlerRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Completions between progress lines
const PROGRESS_INTERVAL: u64 = 10;

/// Summary of one run of the crawl loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// URLs completed in this run (handled, failed or unhandled)
    pub processed: u64,
    /// URLs whose fetch or handler failed
    pub failed: u64,
    /// URLs no handler pattern matched
    pub unhandled: u64,
    /// New URLs accepted by the frontier
    pub discovered: u64,
    /// The run stopped because of an interrupt
    pub interrupted: bool,
}

#[derive(Debug)]
enum Outcome {
    Handled(Vec<String>),
    Failed,
    Unhandled,
}

/// Result of processing one URL, sent back to the loop
#[derive(Debug)]
struct Completion {
    url: String,
    outcome: Outcome,
}

/// Looks up the handler, fetches and handles one URL
///
/// Errors are logged here and turned into [`Outcome::Failed`]; nothing is
/// retried.
async fn process_url<F: Fetch>(
    fetcher: Arc<F>,
    registry: Arc<HandlerRegistry>,
    url: String,
) -> Completion {
    let Some(handler) = registry.find(&url) else {
        tracing::info!(url = %url, "No handler matches, dropping");
        return Completion {
            url,
            outcome: Outcome::Unhandled,
        };
    };

    let outcome = match fetcher.fetch(&url).await {
        Ok(page) => match handler.handle(&page) {
            Ok(urls) => Outcome::Handled(urls),
            Err(e) => {
                tracing::warn!(url = %url, handler = handler.name(), "Handler failed: {}", e);
                Outcome::Failed
            }
        },
        Err(e) => {
            tracing::warn!(url = %url, status = ?e.status(), "Fetch failed: {}", e);
            Outcome::Failed
        }
    };

    Completion { url, outcome }
}

/// Drives a frontier until it is inactive or an interrupt arrives
pub struct Scheduler<F: Fetch> {
    fetcher: Arc<F>,
    registry: Arc<HandlerRegistry>,
    concurrency: usize,
}

impl<F: Fetch> Scheduler<F> {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared page source
    /// * `registry` - Handlers by URL pattern
    /// * `concurrency` - Maximum URLs in flight; 1 selects the sequential loop
    pub fn new(fetcher: Arc<F>, registry: Arc<HandlerRegistry>, concurrency: usize) -> Self {
        Self {
            fetcher,
            registry,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs the crawl loop
    ///
    /// When `shutdown` resolves no further URLs are popped; URLs already in
    /// flight are allowed to finish and their results are recorded. The
    /// caller is responsible for checkpointing afterwards.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The loop finished or was interrupted
    /// * `Err(FrontierError)` - The frontier was popped while empty
    pub async fn run<S>(&self, frontier: &mut Frontier, shutdown: S) -> Result<CrawlReport, FrontierError>
    where
        S: Future<Output = ()>,
    {
        tracing::info!(
            "Starting crawl: {} pending, {} processed, concurrency {}",
            frontier.pending(),
            frontier.processed_count(),
            self.concurrency
        );

        let mut progress = Progress::new();
        let shutdown = std::pin::pin!(shutdown);

        if self.concurrency == 1 {
            self.run_sequential(frontier, shutdown, &mut progress).await?;
        } else {
            self.run_concurrent(frontier, shutdown, &mut progress).await?;
        }

        let report = progress.report;
        tracing::info!(
            "Crawl {}: {} processed, {} failed, {} unhandled, {} discovered in {:?}",
            if report.interrupted { "interrupted" } else { "finished" },
            report.processed,
            report.failed,
            report.unhandled,
            report.discovered,
            progress.started.elapsed()
        );
        Ok(report)
    }

    async fn run_sequential<S>(
        &self,
        frontier: &mut Frontier,
        mut shutdown: std::pin::Pin<&mut S>,
        progress: &mut Progress,
    ) -> Result<(), FrontierError>
    where
        S: Future<Output = ()>,
    {
        while !progress.report.interrupted && frontier.is_active() {
            let url = frontier.pop()?;
            tracing::debug!(url = %url, "Processing");

            let task = process_url(Arc::clone(&self.fetcher), Arc::clone(&self.registry), url);
            let mut task = std::pin::pin!(task);

            let completion = loop {
                tokio::select! {
                    completion = &mut task => break completion,
                    _ = &mut shutdown, if !progress.report.interrupted => {
                        tracing::warn!("Interrupt received, finishing the current page");
                        progress.report.interrupted = true;
                    }
                }
            };
            progress.record(frontier, completion);
        }
        Ok(())
    }

    async fn run_concurrent<S>(
        &self,
        frontier: &mut Frontier,
        mut shutdown: std::pin::Pin<&mut S>,
        progress: &mut Progress,
    ) -> Result<(), FrontierError>
    where
        S: Future<Output = ()>,
    {
        let mut tasks = JoinSet::new();

        loop {
            while !progress.report.interrupted
                && tasks.len() < self.concurrency
                && frontier.is_active()
            {
                let url = frontier.pop()?;
                tracing::debug!(url = %url, "Processing");
                tasks.spawn(process_url(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.registry),
                    url,
                ));
            }

            // Inactive with nothing in flight, or interrupted and drained
            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(completion)) => progress.record(frontier, completion),
                    // The URL stays in flight and is dispatched again after a restore
                    Some(Err(e)) => tracing::error!("Crawl task aborted: {}", e),
                    None => break,
                },
                _ = &mut shutdown, if !progress.report.interrupted => {
                    tracing::warn!(
                        "Interrupt received, waiting for {} in-flight pages",
                        tasks.len()
                    );
                    progress.report.interrupted = true;
                }
            }
        }
        Ok(())
    }
}

struct Progress {
    report: CrawlReport,
    started: Instant,
}

impl Progress {
    fn new() -> Self {
        Self {
            report: CrawlReport::default(),
            started: Instant::now(),
        }
    }

    fn record(&mut self, frontier: &mut Frontier, completion: Completion) {
        match completion.outcome {
            Outcome::Handled(urls) => {
                for url in &urls {
                    if frontier.add(url) {
                        self.report.discovered += 1;
                    }
                }
            }
            Outcome::Failed => self.report.failed += 1,
            Outcome::Unhandled => self.report.unhandled += 1,
        }
        frontier.complete(&completion.url);
        self.report.processed += 1;

        if self.report.processed % PROGRESS_INTERVAL == 0 {
            let elapsed = self.started.elapsed();
            let rate = self.report.processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages processed, {} pending, {:.2} pages/sec",
                self.report.processed,
                frontier.pending(),
                rate
            );
        }
    }
}
