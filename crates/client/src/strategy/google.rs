//! Google web search scraping.
//!
//! Google reshuffles its result markup often, so the rules walk a list of
//! known container shapes. Result links may be `/url?q=<target>` redirects.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::time::Duration;
use url::Url;

use sift_core::model::ExtractedRecord;

use super::{Candidate, ExtractionStrategy, Rule, SelfReference, SourceProfile, first_attr, first_text, selector};
use crate::FetchClient;

const BASE_URL: &str = "https://www.google.com";

const PROFILE: SourceProfile = SourceProfile {
    name: "google",
    cap: 10,
    timeout: Duration::from_secs(15),
    self_reference: SelfReference::Hosts(&["google.*"]),
    fallback_description: Some("Visit this page for more information"),
};

const RULES: [Rule<Html>; 5] = [
    Rule::new("div.g", classic_blocks),
    Rule::new("sokoban", sokoban_blocks),
    Rule::new("Gvuyqf", gvuyqf_blocks),
    Rule::new("result-class", result_class_blocks),
    Rule::new("search-children", search_children_blocks),
];

/// Description candidates, most specific first.
const DESCRIPTION_SELECTORS: [&str; 4] = ["span.sCKkdd", "div.VwiC3b", r#"div[data-content-feature="1"]"#, "p"];

/// Resolve a Google result href, decoding `/url?q=` redirects.
pub fn unwrap_redirect(href: &str) -> Option<String> {
    let url = Url::parse("https://www.google.com/").ok()?.join(href).ok()?;
    if url.path() == "/url" {
        url.query_pairs()
            .find(|(k, _)| k == "q" || k == "url")
            .map(|(_, v)| v.into_owned())
            .filter(|target| !target.is_empty())
    } else {
        Some(url.to_string())
    }
}

fn result_link(block: ElementRef<'_>) -> Option<String> {
    if let Some(href) = first_attr(block, r#"a[href^="http"]"#, "href")
        && Url::parse(&href).is_ok_and(|u| !PROFILE.self_reference.matches(&u))
    {
        return Some(href);
    }

    let anchor = block.select(&selector("a")).next()?;
    let raw = anchor.value().attr("data-url").or_else(|| anchor.value().attr("href"))?;
    unwrap_redirect(raw)
}

fn result_block(block: ElementRef<'_>) -> Option<Candidate> {
    let title = first_text(block, "h3").or_else(|| first_text(block, r#"span[role="heading"]"#))?;
    let href = result_link(block)?;
    let description = DESCRIPTION_SELECTORS
        .iter()
        .filter_map(|css| first_text(block, css))
        .find(|text| text.chars().count() > 10)
        .unwrap_or_default();

    Some(Candidate { title, href, description, ..Default::default() })
}

fn blocks(doc: &Html, container: &str) -> Vec<Candidate> {
    doc.select(&selector(container)).filter_map(result_block).collect()
}

fn classic_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "div.g")
}

fn sokoban_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "div[data-sokoban-container]")
}

fn gvuyqf_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "div.Gvuyqf")
}

fn result_class_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, r#"div[class*="result"]"#)
}

fn search_children_blocks(doc: &Html) -> Vec<Candidate> {
    blocks(doc, "div#search > div > div")
}

/// Extract records from a Google result page.
pub fn parse(body: &str) -> Vec<ExtractedRecord> {
    let doc = Html::parse_document(body);
    PROFILE.apply(&doc, &RULES)
}

/// Scrapes google.com search results.
#[derive(Debug, Clone)]
pub struct GoogleStrategy {
    fetch: FetchClient,
    base_url: String,
}

impl GoogleStrategy {
    pub fn new(fetch: FetchClient) -> Self {
        Self { fetch, base_url: BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for GoogleStrategy {
    fn name(&self) -> &'static str {
        PROFILE.name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        let url = format!("{}/search", self.base_url);
        let params = [("q", query), ("hl", "en"), ("num", "10")];
        match self.fetch.get_html(&url, &params, PROFILE.timeout).await {
            Ok(body) => parse(&body),
            Err(e) => {
                tracing::warn!(strategy = PROFILE.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
