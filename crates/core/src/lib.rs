//! Core types and shared functionality for sift.
//!
//! This crate provides:
//! - The search data model and result normalizer
//! - The SQLite full-text query cache
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;

pub use cache::{CacheAvailability, CacheDb, QueryCache};
pub use config::AppConfig;
pub use error::Error;
pub use model::{CacheDocument, Category, ExtractedRecord, ResultSource, SearchQuery};
