//! Sliding-Window Limiter - Per-Key Request Budgets
//!
//! Each key is a sorted set of request timestamps (Unix ms) in the
//! shared [`WindowStore`]. A check prunes entries that fell out of the
//! trailing window, counts the rest, and either denies or records the
//! current request and pushes the key's expiry to `window + 1s`.
//!
//! Two policies are built in:
//! - API calls: 5 per minute per client (`ratelimit:api:<client>`)
//! - Refresh triggers: 10 per 10 minutes per actor and platform
//!   (`ratelimit:refresh:<actor>:<platform>`)

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::RateLimitError;
use crate::ports::{Clock, Telemetry, WindowStore};

/// Grace added to a key's expiry beyond its window.
const EXPIRY_GRACE: Duration = Duration::from_secs(1);

/// Outcome of a budgeted check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Allowed,
    /// Denied; the oldest surviving entry leaves the window after `retry_after`.
    Denied { retry_after: Duration },
}

impl RefreshDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Limit and window of one budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub limit: u64,
    pub window: Duration,
}

impl WindowPolicy {
    pub const fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    /// 5 requests per minute.
    pub const API: Self = Self::new(5, Duration::from_secs(60));
    /// 10 requests per 10 minutes.
    pub const REFRESH: Self = Self::new(10, Duration::from_secs(600));
}

/// Current usage of a refresh budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub current: u64,
    pub limit: u64,
    pub window_secs: u64,
}

pub fn api_key(client: &str) -> String {
    format!("ratelimit:api:{client}")
}

pub fn refresh_key(actor: &str, platform: &str) -> String {
    format!("ratelimit:refresh:{actor}:{platform}")
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

pub struct SlidingWindowLimiter {
    /// Sorted sets holding each key's request timestamps.
    store: Arc<dyn WindowStore>,
    /// Source of "now" for pruning and retry-after.
    clock: Arc<dyn Clock>,
    /// Receives one event per denial, tagged by scope.
    telemetry: Arc<dyn Telemetry>,
    /// Budget for `ratelimit:api:*` keys.
    api_policy: WindowPolicy,
    /// Budget for `ratelimit:refresh:*` keys.
    refresh_policy: WindowPolicy,
    /// One gate per key; prune-count-record on a key runs under its gate.
    gates: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SlidingWindowLimiter {
    pub fn new(
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            store,
            clock,
            telemetry,
            api_policy: WindowPolicy::API,
            refresh_policy: WindowPolicy::REFRESH,
            gates: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policies(mut self, api: WindowPolicy, refresh: WindowPolicy) -> Self {
        self.api_policy = api;
        self.refresh_policy = refresh;
        self
    }

    /// Take the gate for `key`. Gates nobody else holds are dropped on the way.
    async fn gate(&self, key: &str) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            gates.retain(|k, g| k == key || Arc::strong_count(g) > 1);
            Arc::clone(gates.entry(key.to_string()).or_default())
        };
        gate.lock_owned().await
    }

    /// Record a request under `key` unless `limit` requests already fall
    /// inside the trailing `window`. Returns whether it was allowed.
    pub async fn check(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, RateLimitError> {
        let _gate = self.gate(key).await;
        self.check_locked(key, limit, window).await
    }

    async fn check_locked(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, RateLimitError> {
        let now_ms = self.clock.now().timestamp_millis();
        self.store.remove_below(key, now_ms - millis(window)).await?;

        if self.store.count(key).await? >= limit {
            return Ok(false);
        }

        let member = format!("{now_ms}-{}", Uuid::new_v4());
        self.store.add(key, &member, now_ms).await?;
        self.store.expire(key, window + EXPIRY_GRACE).await?;
        Ok(true)
    }

    /// Check `key` against `policy`, computing the wait on denial.
    async fn decide(
        &self,
        key: &str,
        policy: WindowPolicy,
        scope: &str,
    ) -> Result<RefreshDecision, RateLimitError> {
        let _gate = self.gate(key).await;
        if self.check_locked(key, policy.limit, policy.window).await? {
            return Ok(RefreshDecision::Allowed);
        }

        let window_ms = millis(policy.window);
        let now_ms = self.clock.now().timestamp_millis();
        let retry_ms = match self.store.range_asc(key, 0, 0).await?.first() {
            Some((_, oldest)) => (oldest + window_ms - now_ms).max(1),
            None => window_ms,
        };

        self.telemetry.rate_limited(scope);
        let retry_after = Duration::from_millis(u64::try_from(retry_ms).unwrap_or(1));
        debug!(key, ?retry_after, "Rate limit denied");
        Ok(RefreshDecision::Denied { retry_after })
    }

    /// Per-client budget for the refresh API group.
    #[instrument(skip(self))]
    pub async fn check_api(&self, client: &str) -> Result<RefreshDecision, RateLimitError> {
        self.decide(&api_key(client), self.api_policy, "api").await
    }

    /// Per-actor, per-platform refresh budget. `platform` may be `"all"`.
    #[instrument(skip(self))]
    pub async fn check_refresh_limit(
        &self,
        actor: &str,
        platform: &str,
    ) -> Result<RefreshDecision, RateLimitError> {
        self.decide(&refresh_key(actor, platform), self.refresh_policy, "refresh").await
    }

    /// Usage of a refresh budget without recording a request.
    pub async fn refresh_limit_info(
        &self,
        actor: &str,
        platform: &str,
    ) -> Result<RateLimitInfo, RateLimitError> {
        let key = refresh_key(actor, platform);
        let policy = self.refresh_policy;
        let now_ms = self.clock.now().timestamp_millis();

        let _gate = self.gate(&key).await;
        self.store.remove_below(&key, now_ms - millis(policy.window)).await?;
        let current = self.store.count(&key).await?;

        Ok(RateLimitInfo {
            current,
            limit: policy.limit,
            window_secs: policy.window.as_secs(),
        })
    }
}
