//! Cache administration tools.
//!
//! All three go through `QueryCache`, so an unreachable backend reports
//! itself in the output instead of failing the call.

pub mod clear;
pub mod health;
pub mod stats;

pub use clear::{CacheClearOutput, clear_impl};
pub use health::{CacheHealthOutput, health_impl};
pub use stats::{CacheStatsOutput, stats_impl};
