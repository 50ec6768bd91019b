//! Brave Search API.
//!
//! - **Endpoint**: `https://api.search.brave.com/res/v1/web/search`
//! - **Authentication**: `X-Subscription-Token` header.
//! - **Rate Limiting**: one request per second (free tier), shared by every
//!   clone of the strategy.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use sift_core::model::ExtractedRecord;

use super::{RateLimiter, array_at, require_key, text_field};
use crate::strategy::{Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile};
use crate::{FetchClient, SourceError};

const BASE_URL: &str = "https://api.search.brave.com/res/v1";

/// Minimum interval between requests for rate limiting (1 second for free tier).
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

const PROFILE: SourceProfile = SourceProfile {
    name: "brave",
    cap: 10,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::Hosts(&["brave.com"]),
    fallback_description: None,
};

const RULES: [Rule<Value>; 1] = [Rule::new("web.results", web_results)];

fn web_results(body: &Value) -> Vec<Candidate> {
    array_at(body, "/web/results")
        .filter_map(|result| {
            Some(Candidate {
                title: text_field(result, "title")?,
                href: text_field(result, "url")?,
                description: text_field(result, "description").unwrap_or_default(),
                thumbnail: result.pointer("/thumbnail/src").and_then(Value::as_str).map(str::to_string),
                date: text_field(result, "age"),
                ..Default::default()
            })
        })
        .collect()
}

/// Extract records from a Brave web search response body.
pub fn parse(body: &Value) -> Vec<ExtractedRecord> {
    PROFILE.apply(body, &RULES)
}

/// Brave Web Search API client.
#[derive(Debug, Clone)]
pub struct BraveStrategy {
    fetch: FetchClient,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl BraveStrategy {
    pub fn new(fetch: FetchClient, api_key: impl Into<String>) -> Result<Self, SourceError> {
        let api_key = require_key(api_key, "SIFT_BRAVE_API_KEY")?;
        Ok(Self {
            fetch,
            api_key,
            base_url: BASE_URL.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(MIN_REQUEST_INTERVAL)),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for BraveStrategy {
    fn name(&self) -> &'static str {
        PROFILE.name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/web/search", self.base_url);
        let params = [("q", query), ("count", "10")];
        let headers = [("X-Subscription-Token", self.api_key.as_str())];
        match self.fetch.get_json(&url, &params, &headers, PROFILE.timeout).await {
            Ok(body) => parse(&body),
            Err(e) => {
                tracing::warn!(strategy = PROFILE.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
