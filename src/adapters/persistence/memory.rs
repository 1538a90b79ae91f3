//! Memory Contest Store - Transactional In-Process Contest Table
//!
//! Implements [`ContestStore`] over an ordered map guarded by a tokio
//! `RwLock`. Every write is staged on a copy of the table, optionally
//! flushed to a snapshot, and only then swapped in, so a failed batch
//! leaves the visible table untouched.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use super::refresh_log::RefreshLogFile;
use super::snapshot::{ContestSnapshot, SnapshotStore};
use crate::domain::{
    Contest, ContestDraft, ContestId, ContestStatus, PersistenceError, ReconcileCounts,
    RefreshLogEntry, RefreshOutcome,
};
use crate::ports::{ContestOrder, ContestQuery, ContestStore, StatusCount, StatusTransitions};

/// In-memory refresh-log entries retained by default.
pub const DEFAULT_LOG_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Default)]
struct Tables {
    contests: BTreeMap<ContestId, Contest>,
    /// Uniqueness constraint over `(platform, source_id)`.
    by_source: HashMap<(String, String), ContestId>,
    next_id: ContestId,
}

impl Tables {
    fn from_rows(next_id: ContestId, rows: Vec<Contest>) -> Self {
        let mut tables = Self {
            next_id: next_id.max(1),
            ..Self::default()
        };
        for row in rows {
            tables.next_id = tables.next_id.max(row.id + 1);
            tables
                .by_source
                .insert((row.platform.clone(), row.source_id.clone()), row.id);
            tables.contests.insert(row.id, row);
        }
        tables
    }

    fn snapshot(&self, at: DateTime<Utc>) -> ContestSnapshot {
        ContestSnapshot::new(self.next_id, self.contests.values().cloned().collect(), at)
    }

    fn upsert(&mut self, draft: &ContestDraft) -> bool {
        let key = (draft.platform.clone(), draft.source_id.clone());
        if let Some(row) = self
            .by_source
            .get(&key)
            .and_then(|id| self.contests.get_mut(id))
        {
            row.apply(draft);
            return false;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.by_source.insert(key, id);
        self.contests.insert(id, Contest::from_draft(id, draft.clone()));
        true
    }
}

#[derive(Debug, Default)]
struct RefreshLog {
    entries: VecDeque<RefreshLogEntry>,
    next_id: u64,
}

/// In-memory canonical store with optional on-disk durability.
pub struct MemoryContestStore {
    tables: RwLock<Tables>,
    log: RwLock<RefreshLog>,
    /// Retained refresh-log entries.
    log_capacity: usize,
    snapshot: Option<SnapshotStore>,
    log_file: Option<RefreshLogFile>,
}

impl Default for MemoryContestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContestStore {
    /// A purely in-memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_id: 1,
                ..Tables::default()
            }),
            log: RwLock::new(RefreshLog {
                entries: VecDeque::new(),
                next_id: 1,
            }),
            log_capacity: DEFAULT_LOG_CAPACITY,
            snapshot: None,
            log_file: None,
        }
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity.max(1);
        self
    }

    /// A store backed by `contests.json` and `refresh_log.jsonl` in `data_dir`,
    /// reloading both if present.
    pub async fn open(data_dir: impl AsRef<Path>, log_capacity: usize) -> Result<Self> {
        let snapshot = SnapshotStore::new(data_dir.as_ref()).await?;
        let log_file = RefreshLogFile::new(data_dir.as_ref()).await?;

        let tables = match snapshot.load().await? {
            Some(s) => Tables::from_rows(s.next_id, s.contests),
            None => Tables::from_rows(1, Vec::new()),
        };

        let mut entries: VecDeque<RefreshLogEntry> = log_file.load().await?.into();
        let next_log_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        while entries.len() > log_capacity {
            entries.pop_front();
        }

        info!(
            contests = tables.contests.len(),
            logs = entries.len(),
            "Contest store opened"
        );

        Ok(Self {
            tables: RwLock::new(tables),
            log: RwLock::new(RefreshLog {
                entries,
                next_id: next_log_id,
            }),
            log_capacity: log_capacity.max(1),
            snapshot: Some(snapshot),
            log_file: Some(log_file),
        })
    }

    /// Number of stored contests.
    pub async fn len(&self) -> usize {
        self.tables.read().await.contests.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, staged: &Tables) -> Result<(), PersistenceError> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        snapshot
            .save(&staged.snapshot(Utc::now()))
            .await
            .map_err(|e| PersistenceError::Io(format!("{e:#}")))
    }
}

fn check_constraints(platform: &str, draft: &ContestDraft) -> Result<(), PersistenceError> {
    if draft.platform != platform {
        return Err(PersistenceError::Constraint(format!(
            "row '{}' belongs to platform '{}', batch is for '{platform}'",
            draft.source_id, draft.platform
        )));
    }
    if draft.source_id.trim().is_empty() {
        return Err(PersistenceError::Constraint(format!(
            "row '{}' has an empty source_id",
            draft.name
        )));
    }
    if draft.end_time < draft.start_time {
        return Err(PersistenceError::Constraint(format!(
            "row '{}' ends before it starts",
            draft.source_id
        )));
    }
    Ok(())
}

#[async_trait]
impl ContestStore for MemoryContestStore {
    #[instrument(skip(self, batch), fields(rows = batch.len()))]
    async fn upsert_batch(
        &self,
        platform: &str,
        batch: &[ContestDraft],
    ) -> Result<ReconcileCounts, PersistenceError> {
        for draft in batch {
            check_constraints(platform, draft)?;
        }

        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let mut counts = ReconcileCounts::default();
        for draft in batch {
            if staged.upsert(draft) {
                counts.new_count += 1;
            } else {
                counts.updated_count += 1;
            }
        }

        if let Err(e) = self.persist(&staged).await {
            error!(error = %e, "Snapshot write failed, batch rolled back");
            return Err(e);
        }
        *tables = staged;

        debug!(new = counts.new_count, updated = counts.updated_count, "Batch committed");
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn recompute_statuses(
        &self,
        now: DateTime<Utc>,
    ) -> Result<StatusTransitions, PersistenceError> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let mut moved = StatusTransitions::default();

        // running: start <= now <= end
        for row in staged.contests.values_mut() {
            if row.start_time <= now
                && now <= row.end_time
                && row.status != ContestStatus::Running
            {
                row.status = ContestStatus::Running;
                moved.running += 1;
            }
        }
        // finished: end < now
        for row in staged.contests.values_mut() {
            if row.end_time < now && row.status != ContestStatus::Finished {
                row.status = ContestStatus::Finished;
                moved.finished += 1;
            }
        }
        // upcoming: start > now
        for row in staged.contests.values_mut() {
            if row.start_time > now && row.status != ContestStatus::Upcoming {
                row.status = ContestStatus::Upcoming;
                moved.upcoming += 1;
            }
        }

        if moved.total() > 0 {
            self.persist(&staged).await?;
            *tables = staged;
        }
        Ok(moved)
    }

    #[instrument(
        skip(self, outcome),
        fields(platform = %outcome.platform, status = %outcome.status)
    )]
    async fn append_refresh_log(
        &self,
        outcome: &RefreshOutcome,
        at: DateTime<Utc>,
    ) -> Result<RefreshLogEntry, PersistenceError> {
        let entry = {
            let mut log = self.log.write().await;
            let entry = RefreshLogEntry::from_outcome(log.next_id, outcome, at);
            log.next_id += 1;
            log.entries.push_back(entry.clone());
            while log.entries.len() > self.log_capacity {
                log.entries.pop_front();
            }
            entry
        };

        if let Some(file) = &self.log_file {
            file.append(&entry)
                .await
                .map_err(|e| PersistenceError::Io(format!("{e:#}")))?;
        }
        Ok(entry)
    }

    async fn recent_refresh_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<RefreshLogEntry>, PersistenceError> {
        let log = self.log.read().await;
        Ok(log.entries.iter().rev().take(limit).cloned().collect())
    }

    async fn list(&self, query: &ContestQuery) -> Result<Vec<Contest>, PersistenceError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Contest> = tables
            .contests
            .values()
            .filter(|c| query.platform.as_deref().is_none_or(|p| c.platform == p))
            .filter(|c| query.status.is_none_or(|s| c.status == s))
            .filter(|c| query.start_from.is_none_or(|t| c.start_time >= t))
            .filter(|c| query.start_to.is_none_or(|t| c.start_time <= t))
            .cloned()
            .collect();

        match query.order {
            ContestOrder::StartAsc => rows.sort_by_key(|c| (c.start_time, c.id)),
            ContestOrder::EndDesc => {
                rows.sort_by_key(|c| (std::cmp::Reverse(c.end_time), c.id))
            }
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn get(&self, id: ContestId) -> Result<Option<Contest>, PersistenceError> {
        Ok(self.tables.read().await.contests.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ContestId) -> Result<bool, PersistenceError> {
        let mut tables = self.tables.write().await;
        if !tables.contests.contains_key(&id) {
            return Ok(false);
        }

        let mut staged = tables.clone();
        if let Some(row) = staged.contests.remove(&id) {
            staged.by_source.remove(&(row.platform, row.source_id));
        }
        self.persist(&staged).await?;
        *tables = staged;
        info!(id, "Contest deleted");
        Ok(true)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<StatusCount>, PersistenceError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<(String, ContestStatus), u64> = BTreeMap::new();
        for row in tables.contests.values().filter(|c| c.start_time >= since) {
            *counts.entry((row.platform.clone(), row.status)).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((platform, status), count)| StatusCount {
                platform,
                status,
                count,
            })
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => snapshot.is_healthy().await,
            None => true,
        }
    }
}
