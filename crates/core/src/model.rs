//! Search data model shared by the cache, the extraction strategies and the server.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Maximum number of records returned for any query.
pub const MAX_RESULTS: usize = 10;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 160;

/// Result category requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    All,
    Images,
    Videos,
    News,
    Products,
}

impl Category {
    pub const ALL: [Category; 5] = [Category::All, Category::Images, Category::Videos, Category::News, Category::Products];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::All => "all",
            Category::Images => "images",
            Category::Videos => "videos",
            Category::News => "news",
            Category::Products => "products",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Category::All),
            "images" => Ok(Category::Images),
            "videos" => Ok(Category::Videos),
            "news" => Ok(Category::News),
            "products" => Ok(Category::Products),
            other => Err(Error::InvalidInput(format!("unknown category: {other}"))),
        }
    }
}

/// A single search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub category: Category,
}

impl SearchQuery {
    /// Build a query, rejecting blank text.
    pub fn new(text: &str, category: Category) -> Result<Self, Error> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("query cannot be empty".into()));
        }
        Ok(Self { text: text.to_string(), category })
    }
}

/// A search result in its canonical shape.
///
/// Strategies produce these with batch-scoped ids; the normalizer re-validates
/// and renumbers them before they leave the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub id: u32,
    pub title: String,
    /// Host of `full_url`.
    #[serde(rename = "url")]
    pub display_url: String,
    pub full_url: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A record as persisted in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub key: String,
    pub record: ExtractedRecord,
    pub category: Category,
    pub ingested_at: DateTime<Utc>,
    /// Relevance score from the index, higher is better. Absent for documents not read via lookup.
    pub score: Option<f64>,
}

impl CacheDocument {
    /// Document key: category, source id and ingestion instant.
    pub fn key_for(category: Category, id: u32, ingested_at: &DateTime<Utc>) -> String {
        let nanos = ingested_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| ingested_at.timestamp_micros() * 1_000);
        format!("{category}-{id}-{nanos}")
    }
}

/// Where a search response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Live,
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("Videos".parse::<Category>().unwrap(), Category::Videos);
        assert_eq!(" NEWS ".parse::<Category>().unwrap(), Category::News);
    }

    #[test]
    fn test_category_parse_unknown() {
        let err = "music".parse::<Category>().unwrap_err();
        assert!(err.to_string().contains("INVALID_INPUT"));
    }

    #[test]
    fn test_search_query_rejects_blank() {
        assert!(SearchQuery::new("   ", Category::All).is_err());
        let query = SearchQuery::new("  rust  ", Category::News).unwrap();
        assert_eq!(query.text, "rust");
        assert_eq!(query.category, Category::News);
    }

    #[test]
    fn test_record_json_shape() {
        let record = ExtractedRecord {
            id: 1,
            title: "Rust".into(),
            display_url: "www.rust-lang.org".into(),
            full_url: "https://www.rust-lang.org/".into(),
            description: "A language".into(),
            image_url: None,
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "www.rust-lang.org");
        assert_eq!(json["fullUrl"], "https://www.rust-lang.org/");
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_document_key_shape() {
        let at = DateTime::parse_from_rfc3339("2025-01-20T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let key = CacheDocument::key_for(Category::Products, 3, &at);
        assert_eq!(key, format!("products-3-{}", at.timestamp_nanos_opt().unwrap()));
    }
}
