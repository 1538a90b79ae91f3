//! Redis Window Store - Shared Sorted Sets Across Processes
//!
//! Maps each [`WindowStore`] call onto one Redis round trip
//! (`ZREMRANGEBYSCORE`, `ZCARD`, `ZADD`, `PEXPIRE`, `ZRANGE ... WITHSCORES`).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::domain::RateLimitError;
use crate::ports::WindowStore;

#[derive(Clone)]
pub struct RedisWindowStore {
    manager: ConnectionManager,
    prefix: Option<String>,
}

fn backend(op: &str, e: redis::RedisError) -> RateLimitError {
    RateLimitError::Backend(format!("redis {op}: {e}"))
}

impl RedisWindowStore {
    #[tracing::instrument(level = "debug", skip(url))]
    pub async fn connect(url: &str, prefix: Option<String>) -> Result<Self> {
        let client = redis::Client::open(url).context("redis client open")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("redis connect")?;
        Ok(Self { manager, prefix })
    }

    fn scoped(&self, key: &str) -> String {
        match self.prefix.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => format!("{p}:{key}"),
            _ => key.to_string(),
        }
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove_below(&self, key: &str, max_score: i64) -> Result<u64, RateLimitError> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::cmd("ZREMRANGEBYSCORE")
            .arg(self.scoped(key))
            .arg("-inf")
            .arg(max_score)
            .query_async(&mut conn)
            .await
            .map_err(|e| backend("zremrangebyscore", e))?;
        Ok(removed.max(0) as u64)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn count(&self, key: &str) -> Result<u64, RateLimitError> {
        let mut conn = self.manager.clone();
        let n: i64 = redis::cmd("ZCARD")
            .arg(self.scoped(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| backend("zcard", e))?;
        Ok(n.max(0) as u64)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn add(&self, key: &str, member: &str, score: i64) -> Result<(), RateLimitError> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("ZADD")
            .arg(self.scoped(key))
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| backend("zadd", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RateLimitError> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("PEXPIRE")
            .arg(self.scoped(key))
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| backend("pexpire", e))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn range_asc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, i64)>, RateLimitError> {
        let mut conn = self.manager.clone();
        let entries: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(self.scoped(key))
            .arg(start)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(|e| backend("zrange", e))?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| (member, score as i64))
            .collect())
    }
}
