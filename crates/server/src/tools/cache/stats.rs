//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sift_core::QueryCache;

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    /// Documents currently in the index; 0 when the cache is unreachable.
    pub indexed_documents: u64,
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(cache: &QueryCache) -> Result<CallToolResult, McpError> {
    let indexed_documents = cache.count().await;
    json_result(&CacheStatsOutput { indexed_documents })
}
