//! Error Taxonomy - Typed Failures of the Ingestion Core
//!
//! Fetch failures stay contained to one platform, persistence failures roll
//! back one platform's batch, and unknown names are rejected before any I/O.
//! Rate-limit denials are values, not errors.

use std::time::Duration;

use thiserror::Error;

/// Failure of one adapter's fetch-and-normalize step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch cancelled")]
    Cancelled,
}

/// Failure of the canonical store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// A row in the batch violates a table constraint; the batch is rolled back.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("storage I/O failed: {0}")]
    Io(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// An unknown platform, job or record name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} '{name}' not found")]
pub struct NotFoundError {
    pub kind: &'static str,
    pub name: String,
}

impl NotFoundError {
    pub fn platform(name: impl Into<String>) -> Self {
        Self { kind: "platform", name: name.into() }
    }

    pub fn job(name: impl Into<String>) -> Self {
        Self { kind: "job", name: name.into() }
    }

    pub fn contest(id: impl std::fmt::Display) -> Self {
        Self { kind: "contest", name: id.to_string() }
    }
}

/// Backend failure of the sliding-window store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("window store failure: {0}")]
    Backend(String),
}

/// Failure of a scheduler registration call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },
}

/// Failure of an on-demand refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("reconcile failed: {0}")]
    Persistence(#[from] PersistenceError),
}
