//! Download workload: fetch a flat URL list into the dump directory
//!
//! URLs are read one per line and run through the [`Dispatcher`], so failed
//! downloads are retried with backoff. The pending task list is saved to the
//! state file when the run ends, interrupted or not, and picked up again on
//! the next run.

use crate::crawler::Fetch;
use crate::dispatcher::{DispatchReport, DispatchSettings, DispatchState, Dispatcher};
use crate::handlers::check_redirect;
use crate::storage::ArtifactSink;
use crate::HarvestError;
use anyhow::Context;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs of one download run
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// One URL per line; only read when there is no state file yet
    pub urls_file: PathBuf,
    pub state_file: PathBuf,
    pub dump_dir: PathBuf,
    pub settings: DispatchSettings,
}

/// Reads a URL list, skipping blank lines
pub fn read_urls(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Fetches one URL and stores it; redirected responses are rejected
pub async fn download_one<F: Fetch>(
    fetcher: &F,
    sink: &ArtifactSink,
    url: &str,
) -> anyhow::Result<()> {
    let page = fetcher.fetch(url).await?;
    check_redirect(&page, false)?;
    sink.store(&page.body, url)
        .with_context(|| format!("storing {}", url))?;
    Ok(())
}

/// Runs a download job to completion or until `shutdown` resolves
///
/// # Returns
///
/// * `Ok(DispatchReport)` - Every URL was stored or exhausted its retries
/// * `Err(HarvestError::Interrupted)` - `shutdown` fired; the remaining tasks
///   were saved to the state file
/// * `Err(HarvestError)` - The URL list or state file could not be used
pub async fn run_download<F, S>(
    job: &DownloadJob,
    fetcher: Arc<F>,
    shutdown: S,
) -> Result<DispatchReport, HarvestError>
where
    F: Fetch,
    S: Future<Output = ()>,
{
    let sink = Arc::new(ArtifactSink::new(&job.dump_dir)?);

    let mut dispatcher = match DispatchState::<String>::load(&job.state_file)? {
        Some(state) => {
            tracing::info!(
                "Resuming {} tasks from {}",
                state.tasks.len(),
                job.state_file.display()
            );
            Dispatcher::from_state(job.settings.clone(), state)
        }
        None => {
            let urls = read_urls(&job.urls_file)?;
            tracing::info!("Loaded {} URLs from {}", urls.len(), job.urls_file.display());
            Dispatcher::new(job.settings.clone(), urls)
        }
    };

    let work = move |url: String| {
        let fetcher = Arc::clone(&fetcher);
        let sink = Arc::clone(&sink);
        async move { download_one(fetcher.as_ref(), &sink, &url).await }
    };
    let report = dispatcher.run(work, shutdown).await;

    dispatcher.state().save(&job.state_file)?;
    tracing::info!(
        "Saved {} pending tasks to {}",
        dispatcher.pending(),
        job.state_file.display()
    );

    if report.interrupted {
        return Err(HarvestError::Interrupted {
            processed: report.succeeded as u64,
        });
    }
    Ok(report)
}
