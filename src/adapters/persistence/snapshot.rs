//! Snapshot Store - Atomic JSON Contest Table Persistence
//!
//! Saves the contest table to `contests.json` using atomic writes
//! (write to tmp file, then rename). The file is always either the
//! previous or the new table, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::{Contest, ContestId};

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of the contest table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestSnapshot {
    /// Format version.
    pub version: u32,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Next surrogate id to hand out.
    pub next_id: ContestId,
    /// Every stored contest, ordered by id.
    pub contests: Vec<Contest>,
}

impl ContestSnapshot {
    pub fn new(next_id: ContestId, contests: Vec<Contest>, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            next_id,
            contests,
        }
    }
}

/// Atomic JSON snapshot of the contest table.
pub struct SnapshotStore {
    /// Path to contests.json.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SnapshotStore {
    /// Create a snapshot store in `data_dir`, creating the directory if needed.
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        Ok(Self {
            path: dir.join("contests.json"),
            tmp_path: dir.join("contests.json.tmp"),
        })
    }

    /// Write the snapshot atomically (tmp → rename).
    #[instrument(skip(self, snapshot), fields(rows = snapshot.contests.len()))]
    pub async fn save(&self, snapshot: &ContestSnapshot) -> Result<()> {
        let json = serde_json::to_vec(snapshot).context("Failed to serialize contest snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename snapshot file")?;

        debug!(path = %self.path.display(), "Contest snapshot saved");
        Ok(())
    }

    /// Load the last snapshot. `None` on first startup.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<ContestSnapshot>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            info!("No contest snapshot found, starting empty");
            return Ok(None);
        }

        let json = fs::read(&self.path)
            .await
            .context("Failed to read contest snapshot")?;
        let snapshot: ContestSnapshot =
            serde_json::from_slice(&json).context("Failed to parse contest snapshot")?;

        info!(
            version = snapshot.version,
            rows = snapshot.contests.len(),
            saved_at = %snapshot.saved_at,
            "Contest snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// The data directory is still there and writable.
    pub async fn is_healthy(&self) -> bool {
        let Some(dir) = self.path.parent() else {
            return false;
        };
        let probe = dir.join(".health_check");
        let ok = fs::write(&probe, b"ok").await.is_ok();
        let _ = fs::remove_file(&probe).await;
        ok
    }
}
