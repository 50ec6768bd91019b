//! SerpAPI (Google results as JSON).

use async_trait::async_trait;
use serde_json::Value;

use sift_core::model::ExtractedRecord;

use super::{array_at, require_key, text_field};
use crate::strategy::{Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile};
use crate::{FetchClient, SourceError};

const BASE_URL: &str = "https://serpapi.com";

const SELF_REFERENCE: SelfReference = SelfReference::Hosts(&["google.*", "serpapi.com"]);

const WEB: SourceProfile = SourceProfile {
    name: "serpapi",
    cap: 10,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SELF_REFERENCE,
    fallback_description: None,
};

const NEWS: SourceProfile = SourceProfile { name: "serpapi-news", ..WEB };

const WEB_RULES: [Rule<Value>; 1] = [Rule::new("organic_results", organic_results)];
const NEWS_RULES: [Rule<Value>; 2] = [Rule::new("news_results", news_results), Rule::new("top_stories", top_stories)];

/// Which SerpAPI result set to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerpVertical {
    Web,
    News,
}

impl SerpVertical {
    fn profile(&self) -> &'static SourceProfile {
        match self {
            SerpVertical::Web => &WEB,
            SerpVertical::News => &NEWS,
        }
    }

    fn rules(&self) -> &'static [Rule<Value>] {
        match self {
            SerpVertical::Web => &WEB_RULES,
            SerpVertical::News => &NEWS_RULES,
        }
    }

    /// Extract records from a SerpAPI response body.
    pub fn parse(&self, body: &Value) -> Vec<ExtractedRecord> {
        self.profile().apply(body, self.rules())
    }
}

fn organic_results(body: &Value) -> Vec<Candidate> {
    array_at(body, "/organic_results")
        .filter_map(|item| {
            Some(Candidate {
                title: text_field(item, "title")?,
                href: text_field(item, "link")?,
                description: text_field(item, "snippet").unwrap_or_default(),
                ..Default::default()
            })
        })
        .collect()
}

/// News publisher, given either as a plain string or as `{ "name": ... }`.
fn publisher(item: &Value) -> Option<String> {
    let source = item.get("source")?;
    source
        .as_str()
        .or_else(|| source.get("name").and_then(Value::as_str))
        .map(str::to_string)
}

fn news_item(item: &Value) -> Option<Candidate> {
    Some(Candidate {
        title: text_field(item, "title")?,
        href: text_field(item, "link")?,
        description: text_field(item, "snippet").unwrap_or_default(),
        thumbnail: text_field(item, "thumbnail"),
        source: publisher(item),
        date: text_field(item, "date"),
        ..Default::default()
    })
}

fn news_results(body: &Value) -> Vec<Candidate> {
    array_at(body, "/news_results").filter_map(news_item).collect()
}

fn top_stories(body: &Value) -> Vec<Candidate> {
    array_at(body, "/top_stories").filter_map(news_item).collect()
}

/// Google web or news results via SerpAPI.
#[derive(Debug, Clone)]
pub struct SerpApiStrategy {
    fetch: FetchClient,
    api_key: String,
    vertical: SerpVertical,
    base_url: String,
}

impl SerpApiStrategy {
    pub fn new(fetch: FetchClient, api_key: impl Into<String>, vertical: SerpVertical) -> Result<Self, SourceError> {
        let api_key = require_key(api_key, "SIFT_SERPAPI_KEY")?;
        Ok(Self { fetch, api_key, vertical, base_url: BASE_URL.to_string() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, query: &str) -> Result<Value, SourceError> {
        let url = format!("{}/search", self.base_url);
        let mut params = vec![("q", query), ("api_key", self.api_key.as_str()), ("engine", "google"), ("num", "10")];
        if self.vertical == SerpVertical::News {
            params.push(("tbm", "nws"));
        }

        let body = self.fetch.get_json(&url, &params, &[], self.vertical.profile().timeout).await?;
        if let Some(message) = body.get("error").and_then(Value::as_str) {
            return Err(SourceError::Parse(format!("serpapi error: {message}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl ExtractionStrategy for SerpApiStrategy {
    fn name(&self) -> &'static str {
        self.vertical.profile().name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        match self.request(query).await {
            Ok(body) => self.vertical.parse(&body),
            Err(e) => {
                tracing::warn!(strategy = self.name(), error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
