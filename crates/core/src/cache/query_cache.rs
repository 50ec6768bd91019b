//! Fail-soft facade over [`CacheDb`].
//!
//! Every method answers with an empty / zero / false value when the backend is
//! missing, slow, or erroring, and records the outcome in the shared
//! [`CacheAvailability`]. Callers never see a cache error.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::availability::CacheAvailability;
use super::connection::CacheDb;
use crate::Error;
use crate::model::{CacheDocument, Category, ExtractedRecord};

/// Default bound on a single cache operation.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(5);

/// Query cache used by the search pipeline.
#[derive(Clone, Debug)]
pub struct QueryCache {
    db: Option<CacheDb>,
    availability: Arc<CacheAvailability>,
    timeout: Duration,
}

impl QueryCache {
    /// Wrap an open database.
    pub fn new(db: CacheDb, availability: Arc<CacheAvailability>, timeout: Duration) -> Self {
        Self { db: Some(db), availability, timeout }
    }

    /// A cache with no backend; every operation is a no-op.
    pub fn disconnected(availability: Arc<CacheAvailability>) -> Self {
        Self { db: None, availability, timeout: DEFAULT_CACHE_TIMEOUT }
    }

    /// Open the database at `path`, falling back to a disconnected cache.
    pub async fn connect(path: impl AsRef<Path>, availability: Arc<CacheAvailability>, timeout: Duration) -> Self {
        let path = path.as_ref();
        match tokio::time::timeout(timeout, CacheDb::open(path)).await {
            Ok(Ok(db)) => {
                availability.record(true).await;
                tracing::info!(path = %path.display(), "cache database opened");
                Self::new(db, availability, timeout)
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "cache database unavailable");
                availability.record(false).await;
                Self { db: None, availability, timeout }
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), timeout_ms = timeout.as_millis() as u64, "cache open timed out");
                availability.record(false).await;
                Self { db: None, availability, timeout }
            }
        }
    }

    pub fn availability(&self) -> &Arc<CacheAvailability> {
        &self.availability
    }

    /// Run `op` under the timeout; failures mark the cache unavailable.
    async fn guarded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T, Error>>) -> Option<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(op, error = %e, "cache operation failed");
                self.availability.record(false).await;
                None
            }
            Err(_) => {
                let e = Error::CacheUnavailable(format!("{op} timed out after {}ms", self.timeout.as_millis()));
                tracing::warn!(op, error = %e, "cache operation failed");
                self.availability.record(false).await;
                None
            }
        }
    }

    /// The database, if the latest verdict (rechecked when stale) says it is usable.
    async fn ready(&self) -> Option<&CacheDb> {
        let db = self.db.as_ref()?;
        if self.availability.needs_check().await {
            return self.check(db).await.then_some(db);
        }
        self.availability.verdict().await.filter(|v| v.available).map(|_| db)
    }

    async fn check(&self, db: &CacheDb) -> bool {
        let ok = self.guarded("ping", db.ping()).await.is_some();
        self.availability.record(ok).await;
        ok
    }

    /// Ranked cached documents for `text`, empty when unavailable.
    pub async fn lookup(&self, text: &str, category: Category, limit: usize) -> Vec<CacheDocument> {
        let Some(db) = self.ready().await else {
            return Vec::new();
        };
        let docs = self
            .guarded("lookup", db.search_documents(text, category, limit))
            .await
            .unwrap_or_default();
        tracing::debug!(query = text, %category, hits = docs.len(), "cache lookup");
        docs
    }

    /// Persist records as independent documents. Returns the number written.
    pub async fn store(&self, records: &[ExtractedRecord], category: Category) -> usize {
        if records.is_empty() {
            return 0;
        }
        let Some(db) = self.ready().await else {
            return 0;
        };

        let ingested_at = Utc::now();
        let docs = records
            .iter()
            .map(|record| CacheDocument {
                key: CacheDocument::key_for(category, record.id, &ingested_at),
                record: record.clone(),
                category,
                ingested_at,
                score: None,
            })
            .collect();

        let written = self.guarded("store", db.insert_documents(docs)).await.unwrap_or(0);
        if written > 0 {
            tracing::info!(%category, written, "cached search results");
        }
        written
    }

    /// Latest availability verdict, checking the backend only when there is none.
    pub async fn health(&self) -> bool {
        let Some(db) = self.db.as_ref() else {
            return false;
        };
        match self.availability.verdict().await {
            Some(v) => v.available,
            None => self.check(db).await,
        }
    }

    /// Ping the backend now and record the result.
    pub async fn recheck(&self) -> bool {
        match self.db.as_ref() {
            Some(db) => self.check(db).await,
            None => {
                self.availability.record(false).await;
                false
            }
        }
    }

    /// Number of cached documents, 0 when unavailable.
    pub async fn count(&self) -> u64 {
        let Some(db) = self.ready().await else {
            return 0;
        };
        self.guarded("count", db.count_documents()).await.unwrap_or(0)
    }

    /// Drop every cached document and recreate the schema.
    ///
    /// Attempted regardless of the current verdict; success marks the cache available.
    pub async fn clear(&self) -> bool {
        let Some(db) = self.db.as_ref() else {
            return false;
        };
        let cleared = self.guarded("clear", db.reset()).await.is_some();
        if cleared {
            self.availability.record(true).await;
            tracing::info!("cache cleared");
        }
        cleared
    }
}
