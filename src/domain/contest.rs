//! Contest Model - Canonical Contest Records
//!
//! Adapters produce [`ContestDraft`]s; the store owns [`Contest`] rows and is
//! the only place a surrogate id is assigned. Status is always a function of
//! the contest's time range and an instant, never of upstream phase strings.

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate key of a stored contest. Never handed to adapters.
pub type ContestId = u64;

// ────────────────────────────────────────────
// Lifecycle status
// ────────────────────────────────────────────

/// Lifecycle status derived from wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContestStatus {
    Upcoming,
    Running,
    Finished,
}

impl ContestStatus {
    /// Derive the status of `[start, end]` at `now`.
    ///
    /// `now < start` is upcoming, `start <= now <= end` is running and
    /// `now > end` is finished. Both bounds are inclusive for running.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now <= end {
            Self::Running
        } else {
            Self::Finished
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(Self::Upcoming),
            "running" => Ok(Self::Running),
            "finished" => Ok(Self::Finished),
            other => Err(format!("unknown contest status '{other}'")),
        }
    }
}

// ────────────────────────────────────────────
// Drafts (adapter output) and stored rows
// ────────────────────────────────────────────

/// A normalized contest as produced by a source adapter.
///
/// `platform` is the stable ASCII platform key. `source_id` is the natural
/// key within that platform and must be identical across repeated fetches of
/// the same upstream contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDraft {
    pub name: String,
    pub platform: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Stored independently of `end - start`; some sources report it directly.
    pub duration_seconds: i64,
    pub url: String,
    pub status: ContestStatus,
    pub source_id: String,
    pub refreshed_at: DateTime<Utc>,
}

impl ContestDraft {
    /// Build a draft from a time range, deriving duration and status at `now`.
    pub fn from_range(
        platform: &str,
        source_id: String,
        name: String,
        url: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            platform: platform.to_string(),
            start_time,
            end_time,
            duration_seconds: (end_time - start_time).num_seconds(),
            url,
            status: ContestStatus::at(start_time, end_time, now),
            source_id,
            refreshed_at: now,
        }
    }
}

/// A stored canonical contest row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub name: String,
    pub platform: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub url: String,
    pub status: ContestStatus,
    pub source_id: String,
    pub refreshed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Contest {
    /// Materialize a first sighting under a freshly assigned id.
    pub fn from_draft(id: ContestId, draft: ContestDraft) -> Self {
        Self {
            id,
            created_at: draft.refreshed_at,
            name: draft.name,
            platform: draft.platform,
            start_time: draft.start_time,
            end_time: draft.end_time,
            duration_seconds: draft.duration_seconds,
            url: draft.url,
            status: draft.status,
            source_id: draft.source_id,
            refreshed_at: draft.refreshed_at,
        }
    }

    /// Overwrite the mutable fields from a later sighting.
    ///
    /// `id`, `platform`, `source_id` and `created_at` are left untouched.
    pub fn apply(&mut self, draft: &ContestDraft) {
        self.name.clone_from(&draft.name);
        self.start_time = draft.start_time;
        self.end_time = draft.end_time;
        self.duration_seconds = draft.duration_seconds;
        self.url.clone_from(&draft.url);
        self.status = draft.status;
        self.refreshed_at = draft.refreshed_at;
    }
}

// ────────────────────────────────────────────
// Source-identifier and retention helpers
// ────────────────────────────────────────────

/// Normalize a contest name into a deterministic slug.
///
/// Lowercases, keeps alphanumerics (including non-ASCII letters so CJK names
/// stay distinct), and collapses every other run of characters into one `-`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Build a platform-scoped source identifier, e.g. `codeforces-1990`.
pub fn source_id(platform: &str, native: impl std::fmt::Display) -> String {
    format!("{platform}-{native}")
}

/// True when a contest that ended at `end` falls outside the retention window.
pub fn is_stale(end: DateTime<Utc>, now: DateTime<Utc>, retention_months: u32) -> bool {
    match now.checked_sub_months(Months::new(retention_months)) {
        Some(cutoff) => end < cutoff,
        None => false,
    }
}

/// End of a contest lasting `seconds` from `start`.
///
/// `None` for a negative duration or when the sum leaves chrono's range,
/// so adapters can skip the row instead of panicking.
pub fn end_after(start: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    if seconds < 0 {
        return None;
    }
    TimeDelta::try_seconds(seconds).and_then(|span| start.checked_add_signed(span))
}

/// Coarse human-readable distance to the next lifecycle edge.
pub fn time_remaining(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> String {
    fn span(secs: i64) -> String {
        let hours = secs / 3600;
        if hours >= 24 {
            format!("{}d", hours / 24)
        } else if hours >= 1 {
            format!("{hours}h")
        } else {
            format!("{}m", (secs / 60).max(1))
        }
    }

    match ContestStatus::at(start, end, now) {
        ContestStatus::Upcoming => format!("starts in {}", span((start - now).num_seconds())),
        ContestStatus::Running => format!("ends in {}", span((end - now).num_seconds())),
        ContestStatus::Finished => "finished".to_string(),
    }
}
