//! Credentialed JSON search APIs.
//!
//! These run before the scrapers when their key is configured. Rules here are
//! pure functions over the decoded `serde_json::Value`.

pub mod bing;
pub mod brave;
pub mod serpapi;

pub use bing::BingApiStrategy;
pub use brave::BraveStrategy;
pub use serpapi::{SerpApiStrategy, SerpVertical};

use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::strip_tags;
use crate::SourceError;

/// Reject blank keys up front so a misconfigured source is never registered.
pub(crate) fn require_key(key: impl Into<String>, env: &'static str) -> Result<String, SourceError> {
    let key = key.into();
    if key.trim().is_empty() { Err(SourceError::MissingApiKey(env)) } else { Ok(key) }
}

/// Array at a JSON pointer, empty when absent.
pub(crate) fn array_at<'a>(value: &'a Value, pointer: &str) -> impl Iterator<Item = &'a Value> {
    value.pointer(pointer).and_then(Value::as_array).into_iter().flatten()
}

/// String field with inline markup removed.
pub(crate) fn text_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(strip_tags)
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    last_request: Mutex<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now)),
            min_interval,
        }
    }

    /// Acquire permission to make a request, waiting if necessary.
    pub(crate) async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}
