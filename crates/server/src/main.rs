//! sift-mcp server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use sift_client::SearchPipeline;
use sift_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        apis = ?config.configured_apis(),
        "Starting sift-mcp server on stdio transport"
    );

    let pipeline = Arc::new(SearchPipeline::from_config(&config).await?);
    let handler = handler::SiftServer::new(Arc::clone(&pipeline));
    let server = serve_server(handler, stdio()).await?;

    let served = server.waiting().await;
    pipeline.writer().shutdown().await;
    served?;

    Ok(())
}
