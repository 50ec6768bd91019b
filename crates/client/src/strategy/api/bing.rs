//! Bing Web Search v7 API.

use async_trait::async_trait;
use serde_json::Value;

use sift_core::model::ExtractedRecord;

use super::{array_at, require_key, text_field};
use crate::strategy::{Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile};
use crate::{FetchClient, SourceError};

const BASE_URL: &str = "https://api.bing.microsoft.com";

const PROFILE: SourceProfile = SourceProfile {
    name: "bing-api",
    cap: 10,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::Hosts(&["bing.com", "microsoft.com"]),
    fallback_description: None,
};

const RULES: [Rule<Value>; 1] = [Rule::new("webPages", web_pages)];

fn web_pages(body: &Value) -> Vec<Candidate> {
    array_at(body, "/webPages/value")
        .filter_map(|page| {
            Some(Candidate {
                title: text_field(page, "name")?,
                href: text_field(page, "url")?,
                description: text_field(page, "snippet").unwrap_or_default(),
                date: text_field(page, "dateLastCrawled"),
                ..Default::default()
            })
        })
        .collect()
}

/// Extract records from a Bing v7 response body.
pub fn parse(body: &Value) -> Vec<ExtractedRecord> {
    PROFILE.apply(body, &RULES)
}

/// Bing Web Search through the Azure subscription API.
#[derive(Debug, Clone)]
pub struct BingApiStrategy {
    fetch: FetchClient,
    api_key: String,
    base_url: String,
}

impl BingApiStrategy {
    pub fn new(fetch: FetchClient, api_key: impl Into<String>) -> Result<Self, SourceError> {
        let api_key = require_key(api_key, "SIFT_BING_API_KEY")?;
        Ok(Self { fetch, api_key, base_url: BASE_URL.to_string() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for BingApiStrategy {
    fn name(&self) -> &'static str {
        PROFILE.name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        let url = format!("{}/v7.0/search", self.base_url);
        let params = [("q", query), ("count", "10"), ("textDecorations", "false")];
        let headers = [("Ocp-Apim-Subscription-Key", self.api_key.as_str())];
        match self.fetch.get_json(&url, &params, &headers, PROFILE.timeout).await {
            Ok(body) => parse(&body),
            Err(e) => {
                tracing::warn!(strategy = PROFILE.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchConfig;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_web_pages() {
        let body = json!({
            "webPages": {"value": [
                {"name": "Rust", "url": "https://www.rust-lang.org/", "snippet": "A language empowering everyone"},
                {"name": "Bing", "url": "https://www.bing.com/search?q=rust"},
                {"name": "Docs", "url": "https://learn.microsoft.com/rust"}
            ]}
        });
        let records = parse(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Rust");
    }

    #[test]
    fn test_parse_missing_section_is_empty() {
        assert!(parse(&json!({"_type": "SearchResponse"})).is_empty());
    }

    #[tokio::test]
    async fn test_extract_sends_subscription_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7.0/search"))
            .and(header("Ocp-Apim-Subscription-Key", "bing-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "webPages": {"value": [{"name": "Go", "url": "https://go.dev/", "snippet": "Go"}]}
            })))
            .mount(&server)
            .await;

        let fetch = FetchClient::new(FetchConfig::default()).unwrap();
        let strategy = BingApiStrategy::new(fetch, "bing-key").unwrap().with_base_url(server.uri());
        assert_eq!(strategy.extract("go").await.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_unauthorized_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let fetch = FetchClient::new(FetchConfig::default()).unwrap();
        let strategy = BingApiStrategy::new(fetch, "wrong").unwrap().with_base_url(server.uri());
        assert!(strategy.extract("go").await.is_empty());
    }
}
