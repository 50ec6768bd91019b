//! search tool implementation.
//!
//! Answers from the cache when it has matching documents, otherwise runs the
//! strategy cascade for the requested category.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sift_client::SearchPipeline;
use sift_core::model::{Category, ExtractedRecord, ResultSource, SearchQuery};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search query (required).
    pub query: String,

    /// Result category: all (default), images, videos, news or products.
    #[serde(default)]
    pub category: Option<String>,
}

/// Output structure for the search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchOutput {
    /// The query as searched, trimmed.
    pub query: String,
    pub category: Category,
    pub results: Vec<ExtractedRecord>,
    pub count: usize,
    /// `cache`, `live` or `empty`.
    pub source: ResultSource,
}

/// Implementation of the search tool.
pub async fn search_impl(pipeline: &SearchPipeline, params: SearchParams) -> Result<CallToolResult, McpError> {
    if params.query.trim().is_empty() {
        return Err(ToolError::InvalidInput("query cannot be empty".into()).into());
    }

    let category = match params.category.as_deref() {
        Some(raw) => raw.parse::<Category>()?,
        None => Category::All,
    };
    let query = SearchQuery::new(&params.query, category)?;

    let outcome = pipeline.search(&query).await;
    let output = SearchOutput {
        query: query.text,
        category,
        count: outcome.records.len(),
        results: outcome.records,
        source: outcome.source,
    };

    json_result(&output)
}
