//! DuckDuckGo HTML search.
//!
//! Uses the no-JavaScript endpoint. Result links are usually wrapped in
//! `//duckduckgo.com/l/?uddg=<target>` redirects, which are decoded before the
//! self-reference check.

use async_trait::async_trait;
use scraper::Html;
use url::Url;

use sift_core::model::ExtractedRecord;

use super::{
    Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile, linked_blocks,
    selector, text_of,
};
use crate::FetchClient;

const BASE_URL: &str = "https://html.duckduckgo.com";

const PROFILE: SourceProfile = SourceProfile {
    name: "duckduckgo",
    cap: 10,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::Hosts(&["duckduckgo.com"]),
    fallback_description: None,
};

const RULES: [Rule<Html>; 4] = [
    Rule::new("result-title-a", testid_results),
    Rule::new("result__a", classic_results),
    Rule::new("links_main", links_main_results),
    Rule::new("first-link", first_links),
];

/// Decode a DuckDuckGo redirect link to its target, or return it unchanged.
pub fn unwrap_redirect(href: &str) -> String {
    Url::parse("https://duckduckgo.com/")
        .and_then(|base| base.join(href))
        .ok()
        .and_then(|u| u.query_pairs().find(|(k, _)| k == "uddg").map(|(_, v)| v.into_owned()))
        .filter(|target| !target.is_empty())
        .unwrap_or_else(|| href.to_string())
}

fn unwrapped(candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .map(|c| Candidate { href: unwrap_redirect(&c.href), ..c })
        .collect()
}

fn testid_results(doc: &Html) -> Vec<Candidate> {
    unwrapped(linked_blocks(
        doc,
        "article",
        r#"a[data-testid="result-title-a"]"#,
        Some(r#"[data-testid="result-snippet"]"#),
    ))
}

fn classic_results(doc: &Html) -> Vec<Candidate> {
    unwrapped(linked_blocks(doc, ".result:not(.result--ad)", "a.result__a", Some(".result__snippet")))
}

fn links_main_results(doc: &Html) -> Vec<Candidate> {
    unwrapped(linked_blocks(doc, ".links_main", "h2 a", Some(".snippet")))
}

fn first_links(doc: &Html) -> Vec<Candidate> {
    let candidates = doc
        .select(&selector("div.result > a:first-child"))
        .filter_map(|a| {
            Some(Candidate { title: text_of(a), href: a.value().attr("href")?.to_string(), ..Default::default() })
        })
        .collect();
    unwrapped(candidates)
}

/// Extract records from a DuckDuckGo result page.
pub fn parse(body: &str) -> Vec<ExtractedRecord> {
    let doc = Html::parse_document(body);
    PROFILE.apply(&doc, &RULES)
}

/// Scrapes html.duckduckgo.com.
#[derive(Debug, Clone)]
pub struct DuckDuckGoStrategy {
    fetch: FetchClient,
    base_url: String,
}

impl DuckDuckGoStrategy {
    pub fn new(fetch: FetchClient) -> Self {
        Self { fetch, base_url: BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for DuckDuckGoStrategy {
    fn name(&self) -> &'static str {
        PROFILE.name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        let url = format!("{}/html/", self.base_url);
        match self.fetch.get_html(&url, &[("q", query)], PROFILE.timeout).await {
            Ok(body) => parse(&body),
            Err(e) => {
                tracing::warn!(strategy = PROFILE.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
