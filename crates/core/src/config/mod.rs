//! Application configuration with layered loading.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if SIFT_CONFIG_FILE set)
//! 3. Environment variables (SIFT_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SerpAPI key; enables the `serpapi` and `serpapi-news` strategies.
    #[serde(default)]
    pub serpapi_key: Option<String>,

    /// Bing Web Search v7 subscription key; enables `bing-api`.
    #[serde(default)]
    pub bing_api_key: Option<String>,

    /// Brave Search subscription token; enables `brave`.
    #[serde(default)]
    pub brave_api_key: Option<String>,

    /// Path to the SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent sent to scraped sources.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size read from a source.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Bound on each cache operation, in milliseconds.
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: u64,

    /// Seconds before an "unavailable" cache verdict is checked again.
    #[serde(default = "default_cache_recheck_secs")]
    pub cache_recheck_secs: u64,

    /// Pending write-back jobs held before new ones are dropped.
    #[serde(default = "default_writer_queue_capacity")]
    pub writer_queue_capacity: usize,

    /// Write-back jobs allowed to run at once.
    #[serde(default = "default_writer_concurrency")]
    pub writer_concurrency: usize,

    /// Records returned per search.
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sift-cache.sqlite")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_cache_timeout_ms() -> u64 {
    5_000
}

fn default_cache_recheck_secs() -> u64 {
    60
}

fn default_writer_queue_capacity() -> usize {
    64
}

fn default_writer_concurrency() -> usize {
    4
}

fn default_result_limit() -> usize {
    crate::model::MAX_RESULTS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            bing_api_key: None,
            brave_api_key: None,
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            cache_timeout_ms: default_cache_timeout_ms(),
            cache_recheck_secs: default_cache_recheck_secs(),
            writer_queue_capacity: default_writer_queue_capacity(),
            writer_concurrency: default_writer_concurrency(),
            result_limit: default_result_limit(),
        }
    }
}

impl AppConfig {
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn cache_recheck_interval(&self) -> Duration {
        Duration::from_secs(self.cache_recheck_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SIFT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SIFT_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Names of the credentialed sources that have a key configured.
    pub fn configured_apis(&self) -> Vec<&'static str> {
        [
            ("serpapi", self.serpapi_key.is_some()),
            ("bing-api", self.bing_api_key.is_some()),
            ("brave", self.brave_api_key.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}
