//! Refresh Outcomes - Per-Platform Run Results and Log Entries
//!
//! Every refresh attempt for a platform yields exactly one
//! [`RefreshOutcome`], which is persisted as one [`RefreshLogEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final state of one platform refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Success,
    Failed,
}

impl RefreshStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insert/update tallies from one reconcile transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileCounts {
    pub new_count: u64,
    pub updated_count: u64,
}

/// Result of refreshing a single platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    /// Platform key.
    pub platform: String,
    pub status: RefreshStatus,
    /// Counts on success, failure reason otherwise.
    pub message: String,
    /// Records returned by the adapter (zero on failure).
    pub fetched: u64,
    pub new_count: u64,
    pub updated_count: u64,
    /// Wall time of fetch plus reconcile.
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl RefreshOutcome {
    pub fn success(
        platform: &str,
        fetched: usize,
        counts: ReconcileCounts,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            status: RefreshStatus::Success,
            message: format!(
                "fetched {fetched}, new {}, updated {}",
                counts.new_count, counts.updated_count
            ),
            fetched: fetched as u64,
            new_count: counts.new_count,
            updated_count: counts.updated_count,
            duration_ms,
            started_at,
        }
    }

    /// A failed attempt. Counts are always zero.
    pub fn failed(
        platform: &str,
        reason: impl std::fmt::Display,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            status: RefreshStatus::Failed,
            message: reason.to_string(),
            fetched: 0,
            new_count: 0,
            updated_count: 0,
            duration_ms,
            started_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RefreshStatus::Success
    }
}

/// Append-only audit record of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshLogEntry {
    pub id: u64,
    pub platform: String,
    pub status: RefreshStatus,
    pub message: String,
    pub new_count: u64,
    pub updated_count: u64,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl RefreshLogEntry {
    pub fn from_outcome(id: u64, outcome: &RefreshOutcome, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            platform: outcome.platform.clone(),
            status: outcome.status,
            message: outcome.message.clone(),
            new_count: outcome.new_count,
            updated_count: outcome.updated_count,
            duration_ms: outcome.duration_ms,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_has_zero_counts() {
        let o = RefreshOutcome::failed("luogu", "upstream returned status 503", 12, Utc::now());
        assert!(!o.is_success());
        assert_eq!((o.fetched, o.new_count, o.updated_count), (0, 0, 0));
        assert_eq!(o.message, "upstream returned status 503");
    }

    #[test]
    fn success_message_reports_counts() {
        let counts = ReconcileCounts { new_count: 2, updated_count: 3 };
        let o = RefreshOutcome::success("atcoder", 5, counts, 40, Utc::now());
        assert_eq!(o.message, "fetched 5, new 2, updated 3");
        let entry = RefreshLogEntry::from_outcome(9, &o, o.started_at);
        assert_eq!(entry.status, RefreshStatus::Success);
        assert_eq!(entry.new_count, 2);
    }
}
