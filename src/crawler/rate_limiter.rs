//! Crawl-wide request throttling

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests
///
/// All workers share one limiter. The lock is held across the sleep, so
/// waiters are released one interval apart in lock order.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing at most `requests_per_second` requests
    ///
    /// Non-finite or non-positive rates, and rates so small that the interval
    /// does not fit a [`Duration`], produce an unlimited limiter.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = (requests_per_second.is_finite() && requests_per_second > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / requests_per_second).ok())
            .flatten();
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            interval: None,
            last_request: Mutex::new(None),
        }
    }

    pub fn from_option(requests_per_second: Option<f64>) -> Self {
        requests_per_second.map_or_else(Self::unlimited, Self::new)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Waits until the interval since the previous request has elapsed, then stamps now
    pub async fn wait(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let mut last = self.last_request.lock().await;
        if let Some(ready_at) = (*last).and_then(|previous| previous.checked_add(interval)) {
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
