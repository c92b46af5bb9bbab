use crate::dispatcher::{DispatchState, DispatchTask};
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Longest wait between two attempts of the same object
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry and pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Retries after the first attempt; an object gets `num_retries + 1` attempts
    pub num_retries: u32,

    /// Attempts running at the same time
    pub parallelism: usize,

    /// Upper bound for one attempt; an expired attempt counts as a failure
    pub task_timeout: Option<Duration>,

    /// Wait before the first retry; doubled for every further retry
    pub backoff_base: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            num_retries: 3,
            parallelism: 5,
            task_timeout: None,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl DispatchSettings {
    /// Wait before attempt number `attempt` (1 for the first retry)
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

/// Outcome counts of one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    /// Objects that failed their last allowed attempt
    pub failed: usize,
    /// Failed attempts that were re-queued
    pub retried: usize,
    /// Tasks still pending when the run stopped
    pub remaining: usize,
    pub interrupted: bool,
}

/// Runs a closure over a flat list of objects with bounded retries
///
/// Objects start at attempt 0. A failed attempt is re-queued with
/// `attempt + 1` while `attempt < num_retries`, after a backoff; otherwise the
/// object is dropped with an error log.
#[derive(Debug)]
pub struct Dispatcher<T> {
    settings: DispatchSettings,
    queue: VecDeque<(DispatchTask<T>, Option<Instant>)>,
}

impl<T> Dispatcher<T>
where
    T: Clone + Display + Send + 'static,
{
    pub fn new(settings: DispatchSettings, objects: impl IntoIterator<Item = T>) -> Self {
        Self {
            settings,
            queue: objects
                .into_iter()
                .map(|object| (DispatchTask::new(object), None))
                .collect(),
        }
    }

    /// Resumes from saved state; attempt counts carry over and no backoff is applied
    pub fn from_state(settings: DispatchSettings, state: DispatchState<T>) -> Self {
        Self {
            settings,
            queue: state.tasks.into_iter().map(|task| (task, None)).collect(),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pending tasks with their attempt counts
    pub fn state(&self) -> DispatchState<T> {
        DispatchState {
            tasks: self.queue.iter().map(|(task, _)| task.clone()).collect(),
        }
    }

    /// Runs until every object succeeded or exhausted its retries, or `shutdown` resolves
    ///
    /// After `shutdown` no new attempt starts. Running attempts finish, and
    /// their failures are re-queued under the usual rule, so [`Self::state`]
    /// is complete afterwards.
    pub async fn run<W, Fut, E, S>(&mut self, work: W, shutdown: S) -> DispatchReport
    where
        W: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
        S: Future<Output = ()>,
    {
        let parallelism = self.settings.parallelism.max(1);
        let mut report = DispatchReport::default();
        let mut running: JoinSet<(DispatchTask<T>, Result<(), String>)> = JoinSet::new();
        let mut shutdown = std::pin::pin!(shutdown);

        tracing::info!(
            "Dispatching {} tasks, parallelism {}, {} retries",
            self.queue.len(),
            parallelism,
            self.settings.num_retries
        );

        loop {
            if !report.interrupted {
                while running.len() < parallelism {
                    let Some(task) = self.take_ready(Instant::now()) else {
                        break;
                    };
                    self.spawn_attempt(&mut running, &work, task);
                }
            }

            if running.is_empty() && (report.interrupted || self.queue.is_empty()) {
                break;
            }

            let next_ready = self.next_ready_at();
            let can_start = !report.interrupted && running.len() < parallelism;

            tokio::select! {
                joined = running.join_next(), if !running.is_empty() => match joined {
                    Some(Ok((task, result))) => self.finish(task, result, &mut report),
                    Some(Err(e)) => {
                        report.failed += 1;
                        tracing::error!("Dispatch task aborted: {}", e);
                    }
                    None => {}
                },
                _ = sleep_until_opt(next_ready), if can_start && next_ready.is_some() => {}
                _ = &mut shutdown, if !report.interrupted => {
                    tracing::warn!(
                        "Interrupt received, waiting for {} running tasks",
                        running.len()
                    );
                    report.interrupted = true;
                }
            }
        }

        report.remaining = self.queue.len();
        tracing::info!(
            "Dispatch {}: {} succeeded, {} failed, {} retried, {} remaining",
            if report.interrupted { "interrupted" } else { "finished" },
            report.succeeded,
            report.failed,
            report.retried,
            report.remaining
        );
        report
    }

    /// Removes the first task whose backoff has elapsed
    fn take_ready(&mut self, now: Instant) -> Option<DispatchTask<T>> {
        let index = self
            .queue
            .iter()
            .position(|(_, ready_at)| ready_at.map_or(true, |at| at <= now))?;
        self.queue.remove(index).map(|(task, _)| task)
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.queue.iter().filter_map(|(_, ready_at)| *ready_at).min()
    }

    fn spawn_attempt<W, Fut, E>(
        &self,
        running: &mut JoinSet<(DispatchTask<T>, Result<(), String>)>,
        work: &W,
        task: DispatchTask<T>,
    ) where
        W: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        tracing::debug!(attempt = task.attempt, "Dispatching {}", task.object);

        let attempt = work(task.object.clone());
        let timeout = self.settings.task_timeout;
        running.spawn(async move {
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("timed out after {:?}", limit)),
                },
                None => attempt.await.map_err(|e| e.to_string()),
            };
            (task, result)
        });
    }

    fn finish(&mut self, task: DispatchTask<T>, result: Result<(), String>, report: &mut DispatchReport) {
        let error = match result {
            Ok(()) => {
                report.succeeded += 1;
                return;
            }
            Err(error) => error,
        };

        if task.attempt < self.settings.num_retries {
            let attempt = task.attempt + 1;
            let delay = self.settings.backoff(attempt);
            tracing::warn!(
                "Attempt {} for {} failed: {}; retrying in {:?}",
                task.attempt + 1,
                task.object,
                error,
                delay
            );
            report.retried += 1;
            self.queue.push_back((
                DispatchTask {
                    object: task.object,
                    attempt,
                },
                Some(Instant::now() + delay),
            ));
        } else {
            report.failed += 1;
            tracing::error!(
                "Giving up on {} after {} attempts: {}",
                task.object,
                task.attempt + 1,
                error
            );
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
