//! cache_health tool implementation.
//!
//! Forces a fresh health check of the cache backend.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sift_core::QueryCache;

use crate::tools::json_result;

/// Output from the cache_health tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheHealthOutput {
    /// `healthy` or `unhealthy`.
    pub status: String,
    pub connected: bool,
}

/// Implementation of the cache_health tool.
pub async fn health_impl(cache: &QueryCache) -> Result<CallToolResult, McpError> {
    let connected = cache.recheck().await;
    let status = if connected { "healthy" } else { "unhealthy" };
    json_result(&CacheHealthOutput { status: status.to_string(), connected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::output_of;
    use sift_core::cache::DEFAULT_CACHE_TIMEOUT;
    use sift_core::{CacheAvailability, CacheDb};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_connected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = QueryCache::new(db, Arc::new(CacheAvailability::default()), DEFAULT_CACHE_TIMEOUT);

        let output: CacheHealthOutput = output_of(&health_impl(&cache).await.unwrap());
        assert_eq!(output.status, "healthy");
        assert!(output.connected);
    }

    #[tokio::test]
    async fn test_health_disconnected() {
        let cache = QueryCache::disconnected(Arc::new(CacheAvailability::default()));

        let output: CacheHealthOutput = output_of(&health_impl(&cache).await.unwrap());
        assert_eq!(output.status, "unhealthy");
        assert!(!output.connected);
    }
}
