use crate::error::{ConsultifyError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-key sliding-window request limiter.
///
/// A key may make at most `limit` calls within any `window`. Rejected calls
/// do not count.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn check(&self, key: &str, now: Instant) -> Result<()> {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let queue = hits.entry(key.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            queue.pop_front();
        }
        if queue.len() >= self.limit {
            let retry_after = queue
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(ConsultifyError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }
        queue.push_back(now);
        Ok(())
    }

    /// Drop keys whose every hit has left the window.
    pub fn prune(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let before = hits.len();
        hits.retain(|_, queue| {
            queue
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
        });
        before - hits.len()
    }
}
