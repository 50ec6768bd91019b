//! Configuration validation rules.

use crate::config::AppConfig;
use crate::model::MAX_RESULTS;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when the cache path is empty and
    /// `ConfigError::Invalid` for the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "db_path".into(),
                hint: "set SIFT_DB_PATH or db_path in the config file".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.cache_timeout_ms < 100 {
            return Err(invalid("cache_timeout_ms", "must be at least 100ms"));
        }
        if self.cache_timeout_ms > 60_000 {
            return Err(invalid("cache_timeout_ms", "must not exceed 60000ms"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.writer_queue_capacity == 0 {
            return Err(invalid("writer_queue_capacity", "must be greater than 0"));
        }
        if !(1..=64).contains(&self.writer_concurrency) {
            return Err(invalid("writer_concurrency", "must be between 1 and 64"));
        }

        if !(1..=MAX_RESULTS).contains(&self.result_limit) {
            return Err(invalid("result_limit", format!("must be between 1 and {MAX_RESULTS}")));
        }

        for (field, key) in
            [("serpapi_key", &self.serpapi_key), ("bing_api_key", &self.bing_api_key), ("brave_api_key", &self.brave_api_key)]
        {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                return Err(invalid(field, "must not be blank when set"));
            }
        }

        if self.configured_apis().is_empty() {
            tracing::warn!("no search API keys configured; falling back to HTML scraping only");
        }

        Ok(())
    }
}
