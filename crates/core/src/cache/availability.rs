//! Latest-known cache availability.
//!
//! A small piece of process state shared by every [`QueryCache`](super::QueryCache)
//! handle. It only remembers the last verdict and when it was taken; there is
//! no invalidation protocol. A negative verdict is checked again once it is older
//! than the recheck interval, a positive one is trusted until an operation fails.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default age after which an "unavailable" verdict is checked again.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(60);

/// One availability observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub available: bool,
    pub checked_at: Instant,
}

/// Last-checked-at / last-result pair for the cache backend.
#[derive(Debug)]
pub struct CacheAvailability {
    last: Mutex<Option<Verdict>>,
    recheck_after: Duration,
}

impl Default for CacheAvailability {
    fn default() -> Self {
        Self::new(DEFAULT_RECHECK_INTERVAL)
    }
}

impl CacheAvailability {
    /// No verdict yet; the first cache operation checks the backend.
    pub fn new(recheck_after: Duration) -> Self {
        Self { last: Mutex::new(None), recheck_after }
    }

    /// Start from a fixed verdict.
    pub fn assume(available: bool) -> Self {
        Self {
            last: Mutex::new(Some(Verdict { available, checked_at: Instant::now() })),
            recheck_after: DEFAULT_RECHECK_INTERVAL,
        }
    }

    /// Latest verdict, if any check has happened.
    pub async fn verdict(&self) -> Option<Verdict> {
        *self.last.lock().await
    }

    /// Record the outcome of a health check or an operation.
    pub async fn record(&self, available: bool) -> Verdict {
        let verdict = Verdict { available, checked_at: Instant::now() };
        let mut last = self.last.lock().await;
        if last.is_some_and(|prev| prev.available != available) {
            if available {
                tracing::info!("cache backend available");
            } else {
                tracing::warn!("cache backend unavailable, cache operations disabled");
            }
        }
        *last = Some(verdict);
        verdict
    }

    /// Whether the caller should check the backend before trusting the verdict.
    pub async fn needs_check(&self) -> bool {
        match *self.last.lock().await {
            None => true,
            Some(v) if !v.available => v.checked_at.elapsed() >= self.recheck_after,
            Some(_) => false,
        }
    }
}
