//! Source Port - Contest Fetch-and-Normalize Interface
//!
//! Defines the capability every upstream platform adapter provides.
//! The registry and orchestrator hold `Arc<dyn SourceAdapter>`, never
//! concrete adapter types, so new platforms plug in without touching
//! the refresh path.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::{ContestDraft, FetchError};

/// Default per-adapter fetch budget.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Execution context handed to a single fetch.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Child of the refresh run's token; cancelled when the run is aborted.
    pub cancel: CancellationToken,
    /// Instant used for status derivation and retention filtering.
    pub now: DateTime<Utc>,
}

impl FetchContext {
    pub fn new(cancel: CancellationToken, now: DateTime<Utc>) -> Self {
        Self { cancel, now }
    }
}

/// One upstream contest platform.
///
/// Implementations own their outbound client configuration privately
/// and share no mutable state with other adapters. A malformed row is
/// skipped with a warning; only transport, status or whole-payload
/// failures surface as [`FetchError`].
#[async_trait]
pub trait SourceAdapter: Send + Sync + 'static {
    /// Stable lowercase ASCII platform key.
    fn name(&self) -> &'static str;

    /// Human-facing platform name.
    fn display_name(&self) -> &'static str;

    /// Upper bound on a single fetch, enforced by the orchestrator.
    fn fetch_timeout(&self) -> Duration {
        DEFAULT_FETCH_TIMEOUT
    }

    /// Fetch the upstream listing and normalize it into drafts.
    async fn fetch(&self, ctx: &FetchContext) -> Result<Vec<ContestDraft>, FetchError>;
}
