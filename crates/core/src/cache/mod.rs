//! SQLite-backed cache of previously returned search results.
//!
//! Results are stored as flat documents with an FTS5 index over their text,
//! accessed asynchronously through tokio-rusqlite. [`QueryCache`] is the
//! fail-soft surface the pipeline uses; [`CacheDb`] is the raw handle.

pub mod availability;
pub mod connection;
pub mod documents;
pub mod migrations;
pub mod query_cache;

pub use crate::Error;

pub use availability::{CacheAvailability, Verdict};
pub use connection::CacheDb;
pub use query_cache::{DEFAULT_CACHE_TIMEOUT, QueryCache};
