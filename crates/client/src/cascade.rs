//! Ordered, sequential fallback across extraction strategies.
//!
//! Each category maps to a fixed list of strategies. They run one at a time
//! in registry order and the first one producing a usable record wins; later
//! strategies are never invoked. Every run is isolated in its own task so a
//! panicking or hung strategy reads as an empty result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sift_core::AppConfig;
use sift_core::model::{Category, ExtractedRecord, MAX_RESULTS};
use sift_core::normalize;

use crate::SourceError;
use crate::fetch::{FetchClient, FetchConfig};
use crate::strategy::api::SerpVertical;
use crate::strategy::{
    BingApiStrategy, BingImagesStrategy, BingStrategy, BraveStrategy, DuckDuckGoStrategy, ExtractionStrategy,
    GoogleStrategy, ProductStrategy, Retailer, SerpApiStrategy,
};

/// Upper bound on one strategy run: the slowest source timeout plus grace.
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(20);

/// Category-keyed registry of strategies in priority order.
#[derive(Clone)]
pub struct StrategyCascade {
    registry: HashMap<Category, Vec<Arc<dyn ExtractionStrategy>>>,
    guard_timeout: Duration,
}

impl std::fmt::Debug for StrategyCascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry: HashMap<_, _> = Category::ALL.iter().map(|c| (c.as_str(), self.names_for(*c))).collect();
        f.debug_struct("StrategyCascade")
            .field("registry", &registry)
            .field("guard_timeout", &self.guard_timeout)
            .finish()
    }
}

impl Default for StrategyCascade {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyCascade {
    /// An empty cascade: every category yields nothing.
    pub fn new() -> Self {
        Self { registry: HashMap::new(), guard_timeout: DEFAULT_GUARD_TIMEOUT }
    }

    /// Append `strategy` to the end of `category`'s priority list.
    pub fn register(&mut self, category: Category, strategy: Arc<dyn ExtractionStrategy>) {
        self.registry.entry(category).or_default().push(strategy);
    }

    pub fn with_strategy(mut self, category: Category, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.register(category, Arc::new(strategy));
        self
    }

    pub fn with_guard_timeout(mut self, guard_timeout: Duration) -> Self {
        self.guard_timeout = guard_timeout;
        self
    }

    /// Strategy names for `category`, in the order they are tried.
    pub fn names_for(&self, category: Category) -> Vec<&'static str> {
        self.registry
            .get(&category)
            .map(|list| list.iter().map(|s| s.name()).collect())
            .unwrap_or_default()
    }

    /// Default registry. Credentialed APIs are registered ahead of the
    /// scrapers, and only when their key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let fetch = FetchClient::new(FetchConfig::from(config))?;
        let mut cascade = Self::new();

        if let Some(key) = &config.serpapi_key {
            let web = SerpApiStrategy::new(fetch.clone(), key.as_str(), SerpVertical::Web)?;
            cascade.register(Category::All, Arc::new(web));
        }
        if let Some(key) = &config.bing_api_key {
            cascade.register(Category::All, Arc::new(BingApiStrategy::new(fetch.clone(), key.as_str())?));
        }
        if let Some(key) = &config.brave_api_key {
            cascade.register(Category::All, Arc::new(BraveStrategy::new(fetch.clone(), key.as_str())?));
        }
        cascade.register(Category::All, Arc::new(GoogleStrategy::new(fetch.clone())));
        cascade.register(Category::All, Arc::new(DuckDuckGoStrategy::new(fetch.clone())));
        cascade.register(Category::All, Arc::new(BingStrategy::new(fetch.clone())));

        cascade.register(Category::Images, Arc::new(BingImagesStrategy::new(fetch.clone())));

        if let Some(key) = &config.serpapi_key {
            let news = SerpApiStrategy::new(fetch.clone(), key.as_str(), SerpVertical::News)?;
            cascade.register(Category::News, Arc::new(news));
        }

        for retailer in Retailer::ALL {
            cascade.register(Category::Products, Arc::new(ProductStrategy::new(retailer, fetch.clone())));
        }

        for category in Category::ALL {
            tracing::debug!(%category, strategies = ?cascade.names_for(category), "registered strategies");
        }
        Ok(cascade)
    }

    /// Try each registered strategy for `category` until one yields a usable
    /// record. Returns at most [`MAX_RESULTS`] records, empty when all fail.
    pub async fn run(&self, query: &str, category: Category) -> Vec<ExtractedRecord> {
        let Some(strategies) = self.registry.get(&category) else {
            tracing::debug!(%category, "no strategies registered");
            return Vec::new();
        };

        for strategy in strategies {
            let records = self.attempt(strategy, query).await;
            let usable: Vec<_> = records.into_iter().filter(|r| normalize::is_usable(r, category)).collect();

            if usable.is_empty() {
                tracing::debug!(strategy = strategy.name(), %category, "strategy produced nothing usable");
                continue;
            }

            tracing::info!(strategy = strategy.name(), %category, results = usable.len(), "cascade winner");
            return usable.into_iter().take(MAX_RESULTS).collect();
        }

        tracing::info!(%category, tried = strategies.len(), "all strategies empty");
        Vec::new()
    }

    /// One isolated strategy run; panics and overruns become empty.
    async fn attempt(&self, strategy: &Arc<dyn ExtractionStrategy>, query: &str) -> Vec<ExtractedRecord> {
        let name = strategy.name();
        let task_strategy = Arc::clone(strategy);
        let task_query = query.to_string();
        let mut handle = tokio::spawn(async move { task_strategy.extract(&task_query).await });

        match tokio::time::timeout(self.guard_timeout, &mut handle).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                tracing::warn!(strategy = name, error = %e, "strategy task failed");
                Vec::new()
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(strategy = name, timeout_ms = self.guard_timeout.as_millis() as u64, "strategy timed out");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(title: &str, url: &str) -> ExtractedRecord {
        ExtractedRecord { title: title.into(), full_url: url.into(), ..Default::default() }
    }

    /// Returns fixed records and counts its invocations.
    struct Stub {
        name: &'static str,
        records: Vec<ExtractedRecord>,
        calls: Arc<AtomicUsize>,
    }

    impl Stub {
        fn new(name: &'static str, records: Vec<ExtractedRecord>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (Self { name, records, calls: Arc::clone(&calls) }, calls)
        }
    }

    #[async_trait]
    impl ExtractionStrategy for Stub {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn extract(&self, _query: &str) -> Vec<ExtractedRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.records.clone()
        }
    }

    struct Panics;

    #[async_trait]
    impl ExtractionStrategy for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        async fn extract(&self, _query: &str) -> Vec<ExtractedRecord> {
            panic!("scraper blew up")
        }
    }

    struct Hangs;

    #[async_trait]
    impl ExtractionStrategy for Hangs {
        fn name(&self) -> &'static str {
            "hangs"
        }

        async fn extract(&self, _query: &str) -> Vec<ExtractedRecord> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            vec![record("Late", "https://late.example.com/")]
        }
    }

    #[tokio::test]
    async fn test_first_success_skips_lower_priorities() {
        let (first, first_calls) = Stub::new("first", vec![record("One", "https://one.example.com/")]);
        let (second, second_calls) = Stub::new("second", vec![record("Two", "https://two.example.com/")]);
        let cascade = StrategyCascade::new()
            .with_strategy(Category::All, first)
            .with_strategy(Category::All, second);

        let records = cascade.run("rust", Category::All).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "One");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_only_falls_through() {
        let (junk, _) = Stub::new("junk", vec![record("", "https://x.example.com/"), record("Bad", "not a url")]);
        let (good, good_calls) = Stub::new("good", vec![record("Good", "https://good.example.com/")]);
        let cascade = StrategyCascade::new()
            .with_strategy(Category::All, junk)
            .with_strategy(Category::All, good);

        let records = cascade.run("rust", Category::All).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Good");
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_treated_as_empty() {
        let (fallback, calls) = Stub::new("fallback", vec![record("Ok", "https://ok.example.com/")]);
        let cascade = StrategyCascade::new()
            .with_strategy(Category::All, Panics)
            .with_strategy(Category::All, fallback);

        assert_eq!(cascade.run("rust", Category::All).await.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hung_strategy_is_abandoned() {
        let (fallback, _) = Stub::new("fallback", vec![record("Ok", "https://ok.example.com/")]);
        let cascade = StrategyCascade::new()
            .with_guard_timeout(Duration::from_millis(50))
            .with_strategy(Category::All, Hangs)
            .with_strategy(Category::All, fallback);

        let records = cascade.run("rust", Category::All).await;
        assert_eq!(records[0].title, "Ok");
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let many = (0..25)
            .map(|i| record(&format!("R{i}"), &format!("https://r{i}.example.com/")))
            .collect();
        let (stub, _) = Stub::new("many", many);
        let cascade = StrategyCascade::new().with_strategy(Category::All, stub);
        assert_eq!(cascade.run("rust", Category::All).await.len(), MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_images_need_image_url() {
        let (no_image, _) = Stub::new("no-image", vec![record("Cat", "https://cats.example.com/")]);
        let cascade = StrategyCascade::new().with_strategy(Category::Images, no_image);
        assert!(cascade.run("cat", Category::Images).await.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_category_is_empty() {
        let (stub, calls) = Stub::new("web", vec![record("One", "https://one.example.com/")]);
        let cascade = StrategyCascade::new().with_strategy(Category::All, stub);
        assert!(cascade.run("golang", Category::Videos).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_registry_without_keys() {
        let cascade = StrategyCascade::from_config(&AppConfig::default()).unwrap();
        assert_eq!(cascade.names_for(Category::All), ["google", "duckduckgo", "bing"]);
        assert_eq!(cascade.names_for(Category::Images), ["bing-images"]);
        assert!(cascade.names_for(Category::Videos).is_empty());
        assert!(cascade.names_for(Category::News).is_empty());
        assert_eq!(cascade.names_for(Category::Products), ["amazon", "ebay", "walmart"]);
    }

    #[test]
    fn test_default_registry_puts_apis_first() {
        let config = AppConfig {
            serpapi_key: Some("serp".into()),
            bing_api_key: Some("bing".into()),
            brave_api_key: Some("brave".into()),
            ..Default::default()
        };
        let cascade = StrategyCascade::from_config(&config).unwrap();
        assert_eq!(
            cascade.names_for(Category::All),
            ["serpapi", "bing-api", "brave", "google", "duckduckgo", "bing"]
        );
        assert_eq!(cascade.names_for(Category::News), ["serpapi-news"]);
    }
}
