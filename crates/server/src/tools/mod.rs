//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sift server.

pub mod cache;
pub mod search;

pub use search::{SearchOutput, SearchParams, search_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Pretty-printed JSON as a successful tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
