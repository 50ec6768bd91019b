//! cache_clear tool implementation.
//!
//! Drops every document and recreates the schema.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sift_core::QueryCache;

use crate::tools::json_result;

/// Output from the cache_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheClearOutput {
    /// `cleared` or `failed`.
    pub status: String,
    pub cleared: bool,
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(cache: &QueryCache) -> Result<CallToolResult, McpError> {
    let cleared = cache.clear().await;
    let status = if cleared { "cleared" } else { "failed" };
    tracing::info!(cleared, "cache clear requested");
    json_result(&CacheClearOutput { status: status.to_string(), cleared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::output_of;
    use sift_core::cache::DEFAULT_CACHE_TIMEOUT;
    use sift_core::model::{Category, ExtractedRecord};
    use sift_core::{CacheAvailability, CacheDb};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = QueryCache::new(db, Arc::new(CacheAvailability::default()), DEFAULT_CACHE_TIMEOUT);
        let record = ExtractedRecord {
            id: 1,
            title: "Go".into(),
            display_url: "go.dev".into(),
            full_url: "https://go.dev/".into(),
            ..Default::default()
        };
        cache.store(&[record], Category::All).await;

        let output: CacheClearOutput = output_of(&clear_impl(&cache).await.unwrap());
        assert!(output.cleared);
        assert_eq!(output.status, "cleared");
        assert_eq!(cache.count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_disconnected_fails_softly() {
        let cache = QueryCache::disconnected(Arc::new(CacheAvailability::default()));
        let output: CacheClearOutput = output_of(&clear_impl(&cache).await.unwrap());
        assert!(!output.cleared);
        assert_eq!(output.status, "failed");
    }
}
