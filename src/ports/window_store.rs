//! Window Store Port - Shared Ordered Key-Value Store
//!
//! The sorted-set operations the sliding-window limiter needs. Scores
//! are Unix milliseconds; members are unique per recorded request.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RateLimitError;

/// Sorted set per key, as offered by Redis `Z*` commands.
#[async_trait]
pub trait WindowStore: Send + Sync + 'static {
    /// Remove entries with score `<= max_score`. Returns how many went.
    async fn remove_below(&self, key: &str, max_score: i64) -> Result<u64, RateLimitError>;

    /// Number of entries under `key`.
    async fn count(&self, key: &str) -> Result<u64, RateLimitError>;

    /// Add `member` with `score`.
    async fn add(&self, key: &str, member: &str, score: i64) -> Result<(), RateLimitError>;

    /// Drop the whole key after `ttl` unless refreshed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RateLimitError>;

    /// Entries by ascending score, `start..=stop` by rank (negative counts from the end).
    async fn range_asc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, i64)>, RateLimitError>;
}
