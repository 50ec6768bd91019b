//! Live search for sift.
//!
//! This crate provides the HTTP fetch layer, the per-source extraction
//! strategies, the strategy cascade, the background cache writer and the
//! search pipeline that ties them to the cache in `sift-core`.

pub mod cascade;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod strategy;
pub mod writer;

pub use cascade::StrategyCascade;
pub use error::SourceError;
pub use fetch::{FetchClient, FetchConfig};
pub use pipeline::{SearchOutcome, SearchPipeline, SearchState};
pub use strategy::{ExtractionStrategy, Retailer};
pub use writer::{CacheWriter, WriterConfig, WriterStats};
