//! Bing web search scraping.

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use sift_core::model::ExtractedRecord;

use super::{
    Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile, first_text, selector,
    text_of,
};
use crate::FetchClient;

const BASE_URL: &str = "https://www.bing.com";

const PROFILE: SourceProfile = SourceProfile {
    name: "bing",
    cap: 10,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::Hosts(&["bing.com"]),
    fallback_description: None,
};

const RULES: [Rule<Html>; 4] = [
    Rule::new("li.b_algo", li_algo_blocks),
    Rule::new("div.b_algo", div_algo_blocks),
    Rule::new("result-class", result_class_blocks),
    Rule::new("b_results", result_list_items),
];

const TITLE_LINKS: [&str; 3] = ["h2 a", r#"a[target="_blank"]"#, "a"];

fn result_block(block: ElementRef<'_>) -> Option<Candidate> {
    let anchor = TITLE_LINKS
        .iter()
        .find_map(|css| block.select(&selector(css)).next())?;
    Some(Candidate {
        title: text_of(anchor),
        href: anchor.value().attr("href")?.to_string(),
        description: first_text(block, "p").unwrap_or_default(),
        ..Default::default()
    })
}

fn blocks(doc: &Html, container: &str) -> Vec<Candidate> {
    doc.select(&selector(container)).filter_map(result_block).collect()
}

fn li_algo_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "li.b_algo")
}

fn div_algo_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "div.b_algo")
}

fn result_class_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, r#"div[class*="result"]"#)
}

fn result_list_items(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "ol#b_results li")
}

/// Extract records from a Bing result page.
pub fn parse(body: &str) -> Vec<ExtractedRecord> {
    let doc = Html::parse_document(body);
    PROFILE.apply(&doc, &RULES)
}

/// Scrapes bing.com web results.
#[derive(Debug, Clone)]
pub struct BingStrategy {
    fetch: FetchClient,
    base_url: String,
}

impl BingStrategy {
    pub fn new(fetch: FetchClient) -> Self {
        Self { fetch, base_url: BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for BingStrategy {
    fn name(&self) -> &'static str {
        PROFILE.name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        let url = format!("{}/search", self.base_url);
        match self.fetch.get_html(&url, &[("q", query), ("mkt", "en-US")], PROFILE.timeout).await {
            Ok(body) => parse(&body),
            Err(e) => {
                tracing::warn!(strategy = PROFILE.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
