//! Telemetry Port - Refresh and Scheduler Observations
//!
//! Usecases report what happened through this trait; the Prometheus
//! adapter turns it into metrics. Every method defaults to a no-op.

use crate::domain::RefreshOutcome;

use super::contest_store::StatusTransitions;

pub trait Telemetry: Send + Sync + 'static {
    /// One platform refresh finished, successfully or not.
    fn refresh_finished(&self, _outcome: &RefreshOutcome) {}

    /// A status recomputation pass committed.
    fn statuses_recomputed(&self, _moved: &StatusTransitions) {}

    /// A scheduled job ran to completion (`ok == false` when it errored).
    fn job_finished(&self, _job: &str, _ok: bool) {}

    /// A request was denied by the limiter for `scope` (`api`, `refresh`).
    fn rate_limited(&self, _scope: &str) {}
}

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {}
