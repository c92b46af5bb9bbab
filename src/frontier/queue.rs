use crate::frontier::{FrontierError, FrontierState};
use crate::url::{canonicalize, PriorityMatcher};
use std::collections::{HashSet, VecDeque};
use std::path::Path;

/// Snapshot of frontier counters for logging and inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierStats {
    /// Pending URLs per priority class, highest priority first
    pub pending_by_class: Vec<usize>,
    /// Size of the dedup set
    pub added: usize,
    /// URLs popped so far, across runs
    pub processed: u64,
    /// URLs popped whose handler has not completed
    pub in_flight: usize,
}

impl FrontierStats {
    /// Total pending URLs across all classes
    pub fn pending(&self) -> usize {
        self.pending_by_class.iter().sum()
    }
}

/// Priority-bucketed, deduplicated crawl queue
///
/// Each priority class is a FIFO queue. A URL is queued at most once over the
/// whole life of the crawl, including previous runs restored from a
/// checkpoint: once added it stays in the dedup set forever.
///
/// The frontier is not synchronized; the crawl loop owns it and is its only
/// mutator.
#[derive(Debug)]
pub struct Frontier {
    matcher: PriorityMatcher,
    max_pages: Option<u64>,
    queues: Vec<VecDeque<String>>,
    added: HashSet<String>,
    in_flight: Vec<String>,
    processed_count: u64,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `matcher` - Priority patterns; determines the number of classes
    /// * `max_pages` - Crawl budget, or `None` for no limit
    pub fn new(matcher: PriorityMatcher, max_pages: Option<u64>) -> Self {
        let queues = (0..matcher.class_count()).map(|_| VecDeque::new()).collect();
        Self {
            matcher,
            max_pages,
            queues,
            added: HashSet::new(),
            in_flight: Vec::new(),
            processed_count: 0,
        }
    }

    /// Schedules a URL unless it was ever added before
    ///
    /// The fragment is stripped for dedup; the priority class is computed on
    /// the URL as given. Returns true if the URL was newly scheduled.
    pub fn add(&mut self, url: &str) -> bool {
        let canonical = canonicalize(url);

        if self.added.contains(canonical) {
            tracing::trace!(url = canonical, "Skipped (already scheduled)");
            return false;
        }

        let class = self.matcher.classify(url);
        self.queues[class].push_back(canonical.to_string());
        self.added.insert(canonical.to_string());
        tracing::debug!(url = canonical, priority = class, "Scheduled for download");
        true
    }

    /// Removes and returns the next URL in strict priority order
    ///
    /// The processed counter is incremented first. The returned URL is tracked
    /// as in flight until [`Frontier::complete`] is called for it.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The head of the highest-priority non-empty class
    /// * `Err(FrontierError::Exhausted)` - Nothing is pending
    pub fn pop(&mut self) -> Result<String, FrontierError> {
        self.processed_count += 1;

        for queue in &mut self.queues {
            if let Some(url) = queue.pop_front() {
                self.in_flight.push(url.clone());
                return Ok(url);
            }
        }

        Err(FrontierError::Exhausted)
    }

    /// Marks a popped URL as fully handled
    pub fn complete(&mut self, url: &str) {
        if let Some(idx) = self.in_flight.iter().position(|u| u == url) {
            self.in_flight.remove(idx);
        }
    }

    /// True while something is pending and the crawl budget is not spent
    pub fn is_active(&self) -> bool {
        self.has_pending() && self.max_pages.map_or(true, |max| self.processed_count < max)
    }

    fn has_pending(&self) -> bool {
        self.queues.iter().any(|q| !q.is_empty())
    }

    /// True if the URL (after canonicalization) was ever added
    pub fn contains(&self, url: &str) -> bool {
        self.added.contains(canonicalize(url))
    }

    /// Number of URLs popped so far
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// Total pending URLs across all classes
    pub fn pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// URLs popped whose handler has not completed, in pop order
    pub fn in_flight(&self) -> &[String] {
        &self.in_flight
    }

    pub fn stats(&self) -> FrontierStats {
        FrontierStats {
            pending_by_class: self.queues.iter().map(VecDeque::len).collect(),
            added: self.added.len(),
            processed: self.processed_count,
            in_flight: self.in_flight.len(),
        }
    }

    /// Builds the persisted record of this frontier
    pub fn state(&self) -> FrontierState {
        let mut added: Vec<String> = self.added.iter().cloned().collect();
        added.sort();

        FrontierState {
            processed_count: self.processed_count,
            saved_at: Some(chrono::Utc::now()),
            added,
            in_flight: self.in_flight.clone(),
            queues: self
                .queues
                .iter()
                .map(|q| q.iter().cloned().collect())
                .collect(),
        }
    }

    /// Replaces this frontier's contents with a persisted record
    ///
    /// URLs that were in flight when the record was written go back to the
    /// front of their class, and the processed counter is reduced by their
    /// number, so each of them is dispatched exactly once more. If the record
    /// has a different number of classes than the current priority patterns,
    /// pending URLs are re-classified.
    pub fn apply_state(&mut self, state: FrontierState) {
        self.processed_count = state.processed_count;
        self.added = state.added.into_iter().collect();
        self.in_flight.clear();

        if state.queues.len() == self.matcher.class_count() {
            self.queues = state.queues.into_iter().map(VecDeque::from).collect();
        } else {
            tracing::warn!(
                "Checkpoint has {} priority classes, config has {}; re-classifying pending URLs",
                state.queues.len(),
                self.matcher.class_count()
            );
            self.queues = (0..self.matcher.class_count())
                .map(|_| VecDeque::new())
                .collect();
            for url in state.queues.into_iter().flatten() {
                let class = self.matcher.classify(&url);
                self.queues[class].push_back(url);
            }
        }

        let requeued = state.in_flight.len() as u64;
        for url in state.in_flight.into_iter().rev() {
            let class = self.matcher.classify(&url);
            self.added.insert(url.clone());
            self.queues[class].push_front(url);
        }
        if requeued > 0 {
            tracing::info!("Re-queued {} URLs that were in flight at checkpoint", requeued);
        }
        self.processed_count = self.processed_count.saturating_sub(requeued);
    }

    /// Restores state from a checkpoint file
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The checkpoint was loaded
    /// * `Ok(false)` - No checkpoint exists (cold start); the frontier is unchanged
    /// * `Err(FrontierError)` - The file exists but could not be read or parsed
    pub fn restore(&mut self, path: &Path) -> Result<bool, FrontierError> {
        match FrontierState::load(path)? {
            Some(state) => {
                self.apply_state(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Writes the current state to a checkpoint file
    pub fn checkpoint(&self, path: &Path) -> Result<(), FrontierError> {
        self.state().save(path)
    }
}
