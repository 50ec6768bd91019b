//! Search orchestration.
//!
//! A search walks a small state machine:
//!
//! ```text
//! CacheLookup --hit--> Done
//! CacheLookup --miss--> Extract --empty--> DoneEmpty
//!                       Extract --records--> Normalize --> WriteBack --> Done
//! ```
//!
//! Nothing is retried. Write-back is handed to the [`CacheWriter`] and never
//! delays the response.

use std::sync::Arc;

use serde::Serialize;

use sift_core::model::{Category, ExtractedRecord, ResultSource, SearchQuery};
use sift_core::normalize;
use sift_core::{AppConfig, CacheAvailability, QueryCache};

use crate::SourceError;
use crate::cascade::StrategyCascade;
use crate::writer::{CacheWriter, WriterConfig};

/// Orchestration states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    CacheLookup,
    Extract,
    Normalize,
    WriteBack,
    Done,
    DoneEmpty,
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub records: Vec<ExtractedRecord>,
    pub source: ResultSource,
    /// Terminal state, either `Done` or `DoneEmpty`.
    pub state: SearchState,
}

/// Cache-first search over the strategy cascade.
#[derive(Debug)]
pub struct SearchPipeline {
    cache: QueryCache,
    cascade: StrategyCascade,
    writer: CacheWriter,
    result_limit: usize,
}

impl SearchPipeline {
    pub fn new(cache: QueryCache, cascade: StrategyCascade, writer: CacheWriter, result_limit: usize) -> Self {
        Self { cache, cascade, writer, result_limit }
    }

    /// Connect the cache, build the default cascade and start the writer.
    ///
    /// An unreachable cache is not an error: searches fall through to live
    /// extraction until a later health check succeeds.
    pub async fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let availability = Arc::new(CacheAvailability::new(config.cache_recheck_interval()));
        let cache = QueryCache::connect(&config.db_path, availability, config.cache_timeout()).await;
        let cascade = StrategyCascade::from_config(config)?;
        let writer = CacheWriter::spawn(cache.clone(), WriterConfig::from(config));

        Ok(Self::new(cache, cascade, writer, config.result_limit))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn writer(&self) -> &CacheWriter {
        &self.writer
    }

    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        let category = query.category;
        let mut state = SearchState::CacheLookup;
        let mut records = Vec::new();
        let mut source = ResultSource::Live;

        loop {
            tracing::debug!(query = %query.text, %category, ?state, "search state");
            state = match state {
                SearchState::CacheLookup => {
                    records = self.from_cache(&query.text, category).await;
                    if records.is_empty() {
                        SearchState::Extract
                    } else {
                        source = ResultSource::Cache;
                        SearchState::Done
                    }
                }
                SearchState::Extract => {
                    records = self.cascade.run(&query.text, category).await;
                    if records.is_empty() { SearchState::DoneEmpty } else { SearchState::Normalize }
                }
                SearchState::Normalize => {
                    records = self.limit(normalize::normalize(&records, category));
                    if records.is_empty() { SearchState::DoneEmpty } else { SearchState::WriteBack }
                }
                SearchState::WriteBack => {
                    self.writer.submit(records.clone(), category);
                    SearchState::Done
                }
                SearchState::Done => {
                    tracing::info!(query = %query.text, %category, ?source, results = records.len(), "search complete");
                    return SearchOutcome { records, source, state };
                }
                SearchState::DoneEmpty => {
                    tracing::info!(query = %query.text, %category, "search found nothing");
                    return SearchOutcome { records: Vec::new(), source: ResultSource::Empty, state };
                }
            };
        }
    }

    /// Cached hits, renormalized so they carry fresh ids and current limits.
    async fn from_cache(&self, text: &str, category: Category) -> Vec<ExtractedRecord> {
        let hits: Vec<_> = self
            .cache
            .lookup(text, category, self.result_limit)
            .await
            .into_iter()
            .map(|doc| doc.record)
            .collect();
        self.limit(normalize::normalize(&hits, category))
    }

    fn limit(&self, mut records: Vec<ExtractedRecord>) -> Vec<ExtractedRecord> {
        records.truncate(self.result_limit);
        records
    }
}
