//! Source-specific extraction strategies.
//!
//! Each strategy fetches one source and runs an ordered list of pure rules
//! over the response. A rule turns the parsed document into raw
//! [`Candidate`]s; the strategy's [`SourceProfile`] then vets them (URL
//! resolution, self-reference rejection, truncation, cap). The first rule
//! that yields at least one accepted record wins.
//!
//! Strategies never fail: transport and parse errors are logged and turn into
//! an empty result.

pub mod api;
pub mod bing;
pub mod bing_images;
pub mod duckduckgo;
pub mod google;
pub mod products;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use sift_core::model::{ExtractedRecord, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
use sift_core::normalize::{self, clean_text, parse_full_url};

pub use api::{BingApiStrategy, BraveStrategy, SerpApiStrategy};
pub use bing::BingStrategy;
pub use bing_images::BingImagesStrategy;
pub use duckduckgo::DuckDuckGoStrategy;
pub use google::GoogleStrategy;
pub use products::{ProductStrategy, Retailer};

/// Default per-call timeout for a source.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// One search source.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Stable identifier used in the cascade registry and logs.
    fn name(&self) -> &'static str;

    /// Records for `query`, empty on any failure.
    async fn extract(&self, query: &str) -> Vec<ExtractedRecord>;
}

/// Raw result fields as pulled out of a source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub href: String,
    pub description: String,
    pub image_url: Option<String>,
    pub thumbnail: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
}

/// A named extraction rule over a parsed source document.
pub struct Rule<T: ?Sized> {
    pub name: &'static str,
    pub run: fn(&T) -> Vec<Candidate>,
}

impl<T: ?Sized> Rule<T> {
    pub const fn new(name: &'static str, run: fn(&T) -> Vec<Candidate>) -> Self {
        Self { name, run }
    }
}

/// Which result links point back at the source itself.
#[derive(Debug, Clone, Copy)]
pub enum SelfReference {
    /// Links on these hosts or their subdomains. `"google.*"` matches any host
    /// with a `google` label.
    Hosts(&'static [&'static str]),
    /// Links to these path prefixes, or the site root. Used by retailers whose
    /// product pages live on their own domain.
    ListingPaths(&'static [&'static str]),
}

impl SelfReference {
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            SelfReference::Hosts(hosts) => {
                let Some(host) = url.host_str() else {
                    return false;
                };
                let host = host.to_ascii_lowercase();
                hosts.iter().any(|pattern| match pattern.strip_suffix(".*") {
                    Some(label) => host.split('.').any(|l| l == label),
                    None => host == *pattern || host.ends_with(&format!(".{pattern}")),
                })
            }
            SelfReference::ListingPaths(prefixes) => {
                let path = url.path().trim_end_matches('/');
                path.is_empty() || prefixes.iter().any(|p| path == *p || path.starts_with(&format!("{p}/")))
            }
        }
    }
}

/// Static description of a source: limits and how to vet its links.
#[derive(Debug, Clone, Copy)]
pub struct SourceProfile {
    pub name: &'static str,
    pub cap: usize,
    pub timeout: Duration,
    pub self_reference: SelfReference,
    /// Used when a candidate has no description of its own.
    pub fallback_description: Option<&'static str>,
}

impl SourceProfile {
    /// Run `rules` in order and return the first non-empty accepted set.
    pub fn apply<T: ?Sized>(&self, input: &T, rules: &[Rule<T>]) -> Vec<ExtractedRecord> {
        for rule in rules {
            let candidates = (rule.run)(input);
            let found = candidates.len();
            let accepted = self.accept(candidates);
            tracing::debug!(strategy = self.name, rule = rule.name, found, accepted = accepted.len(), "extraction rule");
            if !accepted.is_empty() {
                return accepted;
            }
        }
        Vec::new()
    }

    /// Vet candidates into records, numbering them from 1.
    pub fn accept(&self, candidates: Vec<Candidate>) -> Vec<ExtractedRecord> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for candidate in candidates {
            if records.len() >= self.cap {
                break;
            }
            match self.to_record(candidate, records.len() as u32 + 1) {
                Ok(record) => {
                    if seen.insert(record.full_url.clone()) {
                        records.push(record);
                    }
                }
                Err(reason) => tracing::debug!(strategy = self.name, reason, "skipped candidate"),
            }
        }
        records
    }

    fn to_record(&self, candidate: Candidate, id: u32) -> Result<ExtractedRecord, String> {
        let href = absolutize(candidate.href.trim());
        let url = parse_full_url(&href).map_err(|e| e.to_string())?;
        if self.self_reference.matches(&url) {
            return Err(format!("self reference: {url}"));
        }

        let mut description = clean_text(&candidate.description, MAX_DESCRIPTION_CHARS);
        if description.is_empty()
            && let Some(fallback) = self.fallback_description
        {
            description = fallback.to_string();
        }

        let record = ExtractedRecord {
            id,
            title: clean_text(&candidate.title, MAX_TITLE_CHARS),
            display_url: normalize::display_url_for(&url),
            full_url: url.to_string(),
            description,
            image_url: candidate.image_url.map(|u| absolutize(&u)),
            thumbnail: candidate.thumbnail.map(|u| absolutize(&u)),
            duration: None,
            source: candidate.source,
            date: candidate.date,
        };

        normalize::validate(&record).map_err(|e| e.to_string())
    }
}

/// Protocol-relative links (`//host/path`) become https.
fn absolutize(href: &str) -> String {
    if href.starts_with("//") { format!("https:{href}") } else { href.to_string() }
}

/// Parse a static CSS selector.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

/// Collapsed text content of an element.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first descendant matching `css`.
pub(crate) fn first_text(element: ElementRef<'_>, css: &str) -> Option<String> {
    element.select(&selector(css)).next().map(text_of).filter(|t| !t.is_empty())
}

/// Attribute of the first descendant matching `css`.
pub(crate) fn first_attr(element: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    element
        .select(&selector(css))
        .find_map(|el| el.value().attr(attr))
        .map(str::to_string)
}

/// Candidates from repeated result blocks: title and href from the first
/// `link` inside each `container`, description from the first `snippet`.
pub(crate) fn linked_blocks(doc: &Html, container: &str, link: &str, snippet: Option<&str>) -> Vec<Candidate> {
    let link_sel = selector(link);
    doc.select(&selector(container))
        .filter_map(|block| {
            let anchor = block.select(&link_sel).next()?;
            Some(Candidate {
                title: text_of(anchor),
                href: anchor.value().attr("href")?.to_string(),
                description: snippet.and_then(|s| first_text(block, s)).unwrap_or_default(),
                ..Default::default()
            })
        })
        .collect()
}

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("invalid tag regex"));

/// Remove inline markup such as `<strong>` from API snippets.
pub(crate) fn strip_tags(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PROFILE: SourceProfile = SourceProfile {
        name: "test",
        cap: 3,
        timeout: DEFAULT_SOURCE_TIMEOUT,
        self_reference: SelfReference::Hosts(&["duckduckgo.com", "google.*"]),
        fallback_description: None,
    };

    fn candidate(title: &str, href: &str) -> Candidate {
        Candidate { title: title.into(), href: href.into(), ..Default::default() }
    }

    #[test]
    fn test_host_self_reference() {
        let hosts = SelfReference::Hosts(&["duckduckgo.com", "google.*"]);
        let yes = ["https://duckduckgo.com/y.js", "https://html.duckduckgo.com/", "https://www.google.co.in/search"];
        let no = ["https://example.com/", "https://notduckduckgo.com/", "https://googleblog.example.com/"];
        for u in yes {
            assert!(hosts.matches(&Url::parse(u).unwrap()), "{u}");
        }
        for u in no {
            assert!(!hosts.matches(&Url::parse(u).unwrap()), "{u}");
        }
    }

    #[test]
    fn test_listing_path_self_reference() {
        let listing = SelfReference::ListingPaths(&["/s", "/sch"]);
        assert!(listing.matches(&Url::parse("https://www.amazon.com/s?k=laptop").unwrap()));
        assert!(listing.matches(&Url::parse("https://www.ebay.com/sch/i.html").unwrap()));
        assert!(listing.matches(&Url::parse("https://www.amazon.com/").unwrap()));
        assert!(!listing.matches(&Url::parse("https://www.amazon.com/dp/B000").unwrap()));
        assert!(!listing.matches(&Url::parse("https://www.amazon.com/sports").unwrap()));
    }

    #[test]
    fn test_accept_filters_and_caps() {
        let records = PROFILE.accept(vec![
            candidate("Self", "https://duckduckgo.com/about"),
            candidate("", "https://empty-title.example.com/"),
            candidate("Bad", "javascript:void(0)"),
            candidate("One", "https://one.example.com/"),
            candidate("Dup", "https://one.example.com/"),
            candidate("Two", "//two.example.com/page"),
            candidate("Three", "https://three.example.com/"),
            candidate("Four", "https://four.example.com/"),
        ]);

        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two", "Three"]);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(records[1].full_url, "https://two.example.com/page");
        assert_eq!(records[1].display_url, "two.example.com");
    }

    #[test]
    fn test_accept_truncates_and_falls_back() {
        let profile = SourceProfile { fallback_description: Some("Visit this page"), ..PROFILE };
        let records = profile.accept(vec![candidate(&"t".repeat(300), "https://example.com/")]);
        assert_eq!(records[0].title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(records[0].description, "Visit this page");
    }

    fn first_rule(_: &Html) -> Vec<Candidate> {
        vec![candidate("Self", "https://www.google.com/")]
    }

    fn second_rule(_: &Html) -> Vec<Candidate> {
        vec![candidate("Real", "https://real.example.com/")]
    }

    fn third_rule(_: &Html) -> Vec<Candidate> {
        panic!("must not run once an earlier rule succeeds")
    }

    #[test]
    fn test_apply_advances_past_rejected_rule() {
        let doc = Html::parse_document("<html></html>");
        let rules = [Rule::new("first", first_rule), Rule::new("second", second_rule), Rule::new("third", third_rule)];
        let records = PROFILE.apply(&doc, &rules);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Real");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("The <strong>Rust</strong> book"), "The Rust book");
    }

    #[test]
    fn test_element_helpers() {
        let doc = Html::parse_fragment(r#"<div><a href="/x"> Hello
            <b>world</b></a><p></p></div>"#);
        let root = doc.root_element();
        assert_eq!(first_text(root, "a").as_deref(), Some("Hello world"));
        assert_eq!(first_attr(root, "a", "href").as_deref(), Some("/x"));
        assert!(first_text(root, "p").is_none());
    }

    fn arb_candidate() -> impl Strategy<Value = Candidate> {
        let href = prop_oneof![
            r"https://(www\.|html\.)?duckduckgo\.com/[a-z]{0,6}",
            r"https://www\.google\.(com|co\.uk)/search",
            r"https://[ab]\.example\.com/",
            r"https?://[a-z]{1,10}\.[a-z]{2,3}/[a-z0-9]{0,10}",
            r"//[a-z]{1,8}\.org/[a-z]{0,8}",
            r"\PC{0,24}",
        ];
        (r"\PC{0,200}", r"\PC{0,300}", href)
            .prop_map(|(title, description, href)| Candidate { title, href, description, ..Default::default() })
    }

    proptest! {
        #[test]
        fn test_accept_output_shape(
            cap in 1usize..12,
            candidates in prop::collection::vec(arb_candidate(), 0..30),
        ) {
            let profile = SourceProfile { cap, ..PROFILE };
            let records = profile.accept(candidates);

            prop_assert!(records.len() <= cap);
            let mut urls = HashSet::new();
            for (idx, r) in records.iter().enumerate() {
                prop_assert_eq!(r.id as usize, idx + 1);
                prop_assert!(!r.title.is_empty());
                prop_assert!(r.title.chars().count() <= MAX_TITLE_CHARS);
                prop_assert!(r.description.chars().count() <= MAX_DESCRIPTION_CHARS);
                let parsed = Url::parse(&r.full_url).unwrap();
                prop_assert!(!profile.self_reference.matches(&parsed));
                prop_assert_eq!(parsed.host_str(), Some(r.display_url.as_str()));
                prop_assert!(urls.insert(r.full_url.clone()));
            }
        }
    }
}
