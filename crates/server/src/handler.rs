//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{clear_impl, health_impl, stats_impl};
use crate::tools::{SearchParams, search_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use sift_client::SearchPipeline;

/// The main MCP server handler for sift.
#[derive(Clone)]
pub struct SiftServer {
    pipeline: Arc<SearchPipeline>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl SiftServer {
    pub fn new(pipeline: Arc<SearchPipeline>) -> Self {
        Self { pipeline, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Search the web. Returns up to 10 results from the local cache or live sources. Category: all (default), images, videos, news, products."
    )]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.pipeline, params.0).await
    }

    #[tool(description = "Check the search cache backend and report whether it is reachable.")]
    async fn cache_health(&self) -> Result<CallToolResult, McpError> {
        health_impl(self.pipeline.cache()).await
    }

    #[tool(description = "Report the number of documents in the search cache.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(self.pipeline.cache()).await
    }

    #[tool(description = "Delete every cached search result and reinitialize the cache schema.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(self.pipeline.cache()).await
    }
}

impl ServerHandler for SiftServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sift".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Cache-first web search. Use `search` for results; the cache_* tools administer the local index.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
