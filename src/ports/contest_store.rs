//! Contest Store Port - Canonical Persistence Interface
//!
//! Transactional access to the contest table and the append-only
//! refresh log. A reconcile batch is all-or-nothing per platform;
//! batches for different platforms are independent transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Contest, ContestDraft, ContestId, ContestStatus, PersistenceError, ReconcileCounts,
    RefreshLogEntry, RefreshOutcome,
};

/// Result ordering for contest queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContestOrder {
    /// Earliest start first.
    #[default]
    StartAsc,
    /// Most recently ended first.
    EndDesc,
}

/// Predicate query over stored contests. All filters are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestQuery {
    /// Platform key.
    pub platform: Option<String>,
    pub status: Option<ContestStatus>,
    /// Inclusive lower bound on start time.
    pub start_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on start time.
    pub start_to: Option<DateTime<Utc>>,
    pub order: ContestOrder,
    pub limit: Option<usize>,
}

/// Rows moved into each status by a recomputation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransitions {
    pub running: u64,
    pub finished: u64,
    pub upcoming: u64,
}

impl StatusTransitions {
    pub fn total(&self) -> u64 {
        self.running + self.finished + self.upcoming
    }
}

/// Row count for one (platform, status) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub platform: String,
    pub status: ContestStatus,
    pub count: u64,
}

/// Canonical contest table plus refresh log.
#[async_trait]
pub trait ContestStore: Send + Sync + 'static {
    /// Insert-or-update a platform batch keyed by `(platform, source_id)`.
    ///
    /// Either every row is applied or none is.
    async fn upsert_batch(
        &self,
        platform: &str,
        batch: &[ContestDraft],
    ) -> Result<ReconcileCounts, PersistenceError>;

    /// Re-derive every row's status at `now` in three bulk updates.
    async fn recompute_statuses(
        &self,
        now: DateTime<Utc>,
    ) -> Result<StatusTransitions, PersistenceError>;

    /// Append one refresh-log entry.
    async fn append_refresh_log(
        &self,
        outcome: &RefreshOutcome,
        at: DateTime<Utc>,
    ) -> Result<RefreshLogEntry, PersistenceError>;

    /// Most recent refresh-log entries, newest first.
    async fn recent_refresh_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<RefreshLogEntry>, PersistenceError>;

    async fn list(&self, query: &ContestQuery) -> Result<Vec<Contest>, PersistenceError>;

    async fn get(&self, id: ContestId) -> Result<Option<Contest>, PersistenceError>;

    /// Administrative delete. Returns `false` when no row had that id.
    async fn delete(&self, id: ContestId) -> Result<bool, PersistenceError>;

    /// Counts by platform and status for contests starting at or after `since`.
    async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<StatusCount>, PersistenceError>;

    async fn is_healthy(&self) -> bool;
}
