//! Retailer product search scraping.
//!
//! Each retailer yields at most five products. A product record carries its
//! price as the description, the retailer name as `source` and the product
//! image as `image_url`. Product pages live on the retailer's own domain, so
//! only links back to search listings (or the bare homepage) count as
//! self-references.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use url::Url;

use sift_core::model::ExtractedRecord;

use super::{
    Candidate, DEFAULT_SOURCE_TIMEOUT, ExtractionStrategy, Rule, SelfReference, SourceProfile, first_attr, first_text,
    selector,
};
use crate::FetchClient;

/// Supported retailers, in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retailer {
    Amazon,
    Ebay,
    Walmart,
}

const AMAZON: SourceProfile = SourceProfile {
    name: "amazon",
    cap: 5,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::ListingPaths(&["/s"]),
    fallback_description: None,
};

const EBAY: SourceProfile = SourceProfile {
    name: "ebay",
    cap: 5,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::ListingPaths(&["/sch"]),
    fallback_description: None,
};

const WALMART: SourceProfile = SourceProfile {
    name: "walmart",
    cap: 5,
    timeout: DEFAULT_SOURCE_TIMEOUT,
    self_reference: SelfReference::ListingPaths(&["/search"]),
    fallback_description: None,
};

const AMAZON_RULES: [Rule<Html>; 1] = [Rule::new("s-search-result", amazon_results)];
const EBAY_RULES: [Rule<Html>; 1] = [Rule::new("s-item", ebay_items)];
const WALMART_RULES: [Rule<Html>; 2] =
    [Rule::new("product-testid", walmart_testid_items), Rule::new("automation-id", walmart_automation_items)];

impl Retailer {
    pub const ALL: [Retailer; 3] = [Retailer::Amazon, Retailer::Ebay, Retailer::Walmart];

    fn profile(&self) -> &'static SourceProfile {
        match self {
            Retailer::Amazon => &AMAZON,
            Retailer::Ebay => &EBAY,
            Retailer::Walmart => &WALMART,
        }
    }

    fn rules(&self) -> &'static [Rule<Html>] {
        match self {
            Retailer::Amazon => &AMAZON_RULES,
            Retailer::Ebay => &EBAY_RULES,
            Retailer::Walmart => &WALMART_RULES,
        }
    }

    /// Display name stored in `source`.
    pub fn label(&self) -> &'static str {
        match self {
            Retailer::Amazon => "Amazon",
            Retailer::Ebay => "eBay",
            Retailer::Walmart => "Walmart",
        }
    }

    /// Site origin that relative product links resolve against.
    fn origin(&self) -> &'static str {
        match self {
            Retailer::Amazon => "https://www.amazon.com",
            Retailer::Ebay => "https://www.ebay.com",
            Retailer::Walmart => "https://www.walmart.com",
        }
    }

    /// Search path and query parameter name.
    fn search_endpoint(&self) -> (&'static str, &'static str) {
        match self {
            Retailer::Amazon => ("/s", "k"),
            Retailer::Ebay => ("/sch/i.html", "_nkw"),
            Retailer::Walmart => ("/search", "q"),
        }
    }

    /// Extract product records from a search results page.
    pub fn parse(&self, body: &str) -> Vec<ExtractedRecord> {
        let doc = Html::parse_document(body);
        self.profile().apply(&doc, self.rules())
    }
}

fn resolve(origin: &str, href: Option<String>) -> String {
    let href = href.unwrap_or_default();
    Url::parse(origin)
        .and_then(|base| base.join(&href))
        .map(|u| u.to_string())
        .unwrap_or(href)
}

fn product(
    retailer: Retailer, item: ElementRef<'_>, name_css: &str, price_css: &str, link_css: &str, image_css: &str,
) -> Option<Candidate> {
    let title = first_text(item, name_css)?;
    let price = first_text(item, price_css)?;
    let href = resolve(retailer.origin(), first_attr(item, link_css, "href"));
    let image_url = first_attr(item, image_css, "src").map(|src| resolve(retailer.origin(), Some(src)));
    Some(Candidate {
        title,
        href,
        description: price,
        image_url,
        source: Some(retailer.label().to_string()),
        ..Default::default()
    })
}

fn items(doc: &Html, retailer: Retailer, container: &str, fields: [&str; 4]) -> Vec<Candidate> {
    let [name, price, link, image] = fields;
    doc.select(&selector(container))
        .filter_map(|item| product(retailer, item, name, price, link, image))
        .collect()
}

fn amazon_results(doc: &Html) -> Vec<Candidate> {
    items(
        doc,
        Retailer::Amazon,
        r#"[data-component-type="s-search-result"]"#,
        ["h2 a span, h2 span", ".a-price .a-offscreen, .a-price-whole", "h2 a, a.a-link-normal[href]", "img.s-image, img"],
    )
}

fn ebay_items(doc: &Html) -> Vec<Candidate> {
    items(doc, Retailer::Ebay, ".s-item", [".s-item__title", ".s-item__price", ".s-item__link", ".s-item__image img"])
}

fn walmart_testid_items(doc: &Html) -> Vec<Candidate> {
    items(
        doc,
        Retailer::Walmart,
        "[data-item-index]",
        [r#"[data-testid="productTitle"]"#, r#"[data-testid="productPrice"]"#, r#"a[href*="/ip/"]"#, "img"],
    )
}

fn walmart_automation_items(doc: &Html) -> Vec<Candidate> {
    items(
        doc,
        Retailer::Walmart,
        "[data-item-id]",
        [
            r#"[data-automation-id="product-title"]"#,
            r#"[data-automation-id="product-price"] span, [data-automation-id="product-price"]"#,
            r#"a[href*="/ip/"]"#,
            r#"img[data-testid="productTileImage"], img"#,
        ],
    )
}

/// Scrapes one retailer's product search.
#[derive(Debug, Clone)]
pub struct ProductStrategy {
    retailer: Retailer,
    fetch: FetchClient,
    base_url: String,
}

impl ProductStrategy {
    pub fn new(retailer: Retailer, fetch: FetchClient) -> Self {
        Self { retailer, fetch, base_url: retailer.origin().to_string() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ExtractionStrategy for ProductStrategy {
    fn name(&self) -> &'static str {
        self.retailer.profile().name
    }

    async fn extract(&self, query: &str) -> Vec<ExtractedRecord> {
        let (search_path, param) = self.retailer.search_endpoint();
        let url = format!("{}{search_path}", self.base_url);
        let profile = self.retailer.profile();
        match self.fetch.get_html(&url, &[(param, query)], profile.timeout).await {
            Ok(body) => self.retailer.parse(&body),
            Err(e) => {
                tracing::warn!(strategy = profile.name, error = %e, "source request failed");
                Vec::new()
            }
        }
    }
}
