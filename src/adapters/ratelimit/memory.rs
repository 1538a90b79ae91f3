//! Memory Window Store - In-Process Sorted Sets with Expiry
//!
//! Single-process stand-in for Redis sorted sets. Expiry is evaluated
//! lazily against the injected [`Clock`] so window tests stay
//! deterministic.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::RateLimitError;
use crate::ports::{Clock, WindowStore};

#[derive(Debug, Default)]
struct SortedSet {
    /// Ordered by `(score, member)`, like a Redis ZSET.
    entries: BTreeSet<(i64, String)>,
    expires_at: Option<DateTime<Utc>>,
}

pub struct MemoryWindowStore {
    clock: Arc<dyn Clock>,
    sets: Mutex<HashMap<String, SortedSet>>,
}

impl MemoryWindowStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sets: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the key space and drop whatever has expired.
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SortedSet>>, RateLimitError> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|_| RateLimitError::Backend("window store lock poisoned".into()))?;
        let now = self.clock.now();
        sets.retain(|_, set| set.expires_at.is_none_or(|at| at > now));
        Ok(sets)
    }
}

/// Resolve Redis-style rank bounds (negative counts from the end).
fn rank_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn remove_below(&self, key: &str, max_score: i64) -> Result<u64, RateLimitError> {
        let mut sets = self.lock()?;
        let Some(set) = sets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.entries.len();
        set.entries.retain(|(score, _)| *score > max_score);
        Ok((before - set.entries.len()) as u64)
    }

    async fn count(&self, key: &str) -> Result<u64, RateLimitError> {
        Ok(self.lock()?.get(key).map_or(0, |s| s.entries.len() as u64))
    }

    async fn add(&self, key: &str, member: &str, score: i64) -> Result<(), RateLimitError> {
        let mut sets = self.lock()?;
        let set = sets.entry(key.to_string()).or_default();
        set.entries.retain(|(_, m)| m != member);
        set.entries.insert((score, member.to_string()));
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RateLimitError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| RateLimitError::Backend(format!("bad ttl: {e}")))?;
        if let Some(set) = self.lock()?.get_mut(key) {
            set.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn range_asc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, i64)>, RateLimitError> {
        let sets = self.lock()?;
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };
        let Some((from, to)) = rank_bounds(set.entries.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(set
            .entries
            .iter()
            .skip(from)
            .take(to - from + 1)
            .map(|(score, member)| (member.clone(), *score))
            .collect())
    }
}
