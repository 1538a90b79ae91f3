//! Refresh Log File - Append-only JSONL Refresh History
//!
//! One line per refresh attempt in `refresh_log.jsonl`. Malformed
//! lines are skipped on load so a torn final write never blocks startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::RefreshLogEntry;

pub struct RefreshLogFile {
    path: PathBuf,
}

impl RefreshLogFile {
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;
        Ok(Self {
            path: dir.join("refresh_log.jsonl"),
        })
    }

    /// Append one entry and flush.
    #[instrument(skip(self, entry), fields(platform = %entry.platform, id = entry.id))]
    pub async fn append(&self, entry: &RefreshLogEntry) -> Result<()> {
        let mut line =
            serde_json::to_string(entry).context("Failed to serialize refresh log entry")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open refresh log file")?;

        file.write_all(line.as_bytes())
            .await
            .context("Failed to write refresh log entry")?;
        file.flush().await.context("Failed to flush refresh log")?;
        Ok(())
    }

    /// Every readable entry, oldest first.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<RefreshLogEntry>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .context("Failed to read refresh log")?;

        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RefreshLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    file = %self.path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping malformed refresh log line"
                ),
            }
        }

        entries.sort_by_key(|e| (e.created_at, e.id));
        info!(count = entries.len(), "Loaded refresh log");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RefreshOutcome;
    use chrono::Utc;

    #[tokio::test]
    async fn append_survives_a_torn_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = RefreshLogFile::new(dir.path()).await.unwrap();

        let outcome =
            RefreshOutcome::failed("atcoder", "fetch timed out after 10s", 10_000, Utc::now());
        log.append(&RefreshLogEntry::from_outcome(1, &outcome, Utc::now())).await.unwrap();
        tokio::fs::write(
            dir.path().join("refresh_log.jsonl"),
            format!(
                "{}{{\"id\":2,\"plat",
                tokio::fs::read_to_string(dir.path().join("refresh_log.jsonl")).await.unwrap()
            ),
        )
        .await
        .unwrap();

        let entries = log.load().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].platform, "atcoder");
    }
}
