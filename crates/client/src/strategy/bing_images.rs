//! Bing image search scraping.
//!
//! Tiles on the image results page carry a JSON `m` attribute with the hosting
//! page (`purl`), the full image (`murl`) and a thumbnail (`turl`). When that
//! metadata is missing the lazy-loaded `<img data-src>` thumbnails are used
//! directly.

use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;

use sift_core::model::ExtractedRecord;

use super::{Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile, selector};
use crate::FetchClient;

const BASE_URL: &str = "https://www.bing.com";

const PROFILE: SourceProfile = SourceProfile {
    name: "bing-images",
    cap: 8,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::Hosts(&["bing.com"]),
    fallback_description: None,
};

const RULES: [Rule<Html>; 2] = [Rule::new("iusc-metadata", metadata_tiles), Rule::new("img-data-src", lazy_images)];

/// Tile metadata embedded in the `m` attribute.
#[derive(Debug, Deserialize)]
struct TileMeta {
    #[serde(default)]
    purl: Option<String>,
    #[serde(default)]
    murl: Option<String>,
    #[serde(default)]
    turl: Option<String>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    desc: Option<String>,
}

fn metadata_tiles(doc: &Html) -> Vec<Candidate> {
    doc.select(&selector("a.iusc[m]"))
        .filter_map(|tile| {
            let raw = tile.value().attr("m")?;
            let meta: TileMeta = match serde_json::from_str(raw) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping image tile with unreadable metadata");
                    return None;
                }
            };
            let title = meta.t.unwrap_or_default();
            Some(Candidate {
                description: meta.desc.unwrap_or_else(|| title.clone()),
                title,
                href: meta.purl?,
                image_url: meta.murl,
                thumbnail: meta.turl,
                ..Default::default()
            })
        })
        .collect()
}

fn lazy_images(doc: &Html) -> Vec<Candidate> {
    doc.select(&selector("img[data-src]"))
        .filter_map(|img| {
            let src = img.value().attr("data-src").or_else(|| img.value().attr("src"))?;
            if !src.starts_with("http") {
                return None;
            }
            let alt = img.value().attr("alt").map(str::trim).filter(|a| !a.is_empty()).unwrap_or("Image");
            Some(Candidate {
                title: alt.to_string(),
                href: src.to_string(),
                description: alt.to_string(),
                image_url: Some(src.to_string()),
                ..Default::default()
            })
        })
        .collect()
}

/// Extract image records from a Bing image results page.
pub fn parse(body: &str) -> Vec<ExtractedRecord> {
    let doc = Html::parse_document(body);
    PROFILE.apply(&doc, &RULES)
}

/// Scrapes bing.com/images.
#[derive(Debug, Clone)]
pub struct BingImagesStrategy {
    fetch: FetchClient,
    base_url: String,
}

impl BingImagesStrategy {
    pub fn new(fetch: FetchClient) -> Self {
        Self { fetch, base_url: BASE_URL.to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for BingImagesStrategy {
    fn name(&self) -> &'static str {
        PROFILE.name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        let url = format!("{}/images/search", self.base_url);
        match self.fetch.get_html(&url, &[("q", query), ("mkt", "en-US")], PROFILE.timeout).await {
            Ok(body) => parse(&body),
            Err(e) => {
                tracing::warn!(strategy = PROFILE.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
