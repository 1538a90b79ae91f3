//! Refresh Orchestrator - Concurrent Fan-out over Source Adapters
//!
//! Drives one task per platform, joins them behind an explicit barrier
//! and guarantees exactly one refresh-log entry per platform per run,
//! whatever happened to the fetch or the reconcile.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::reconciler::Reconciler;
use super::registry::AdapterRegistry;
use crate::domain::{
    FetchError, NotFoundError, ReconcileCounts, RefreshError, RefreshOutcome,
};
use crate::ports::{Clock, ContestStore, FetchContext, SourceAdapter, Telemetry};

pub struct RefreshOrchestrator {
    /// Read-only after startup.
    registry: Arc<AdapterRegistry>,
    /// Dedups each batch and commits it in one transaction.
    reconciler: Reconciler,
    /// Refresh-log sink.
    store: Arc<dyn ContestStore>,
    /// Stamps fetch contexts and log entries.
    clock: Arc<dyn Clock>,
    /// Receives every per-platform outcome.
    telemetry: Arc<dyn Telemetry>,
}

impl RefreshOrchestrator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn ContestStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            registry,
            reconciler: Reconciler::new(Arc::clone(&store)),
            store,
            clock,
            telemetry,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Refresh every registered platform concurrently.
    ///
    /// Blocks until every platform task has finished. Each task gets a
    /// child of `cancel`; cancelling it turns unfinished fetches into
    /// failed outcomes instead of hanging the barrier.
    #[instrument(skip(self, cancel), fields(platforms = self.registry.len()))]
    pub async fn refresh_all(
        self: &Arc<Self>,
        cancel: &CancellationToken,
    ) -> BTreeMap<String, RefreshOutcome> {
        let mut names = Vec::with_capacity(self.registry.len());
        let mut tasks = Vec::with_capacity(self.registry.len());

        for (name, adapter) in self.registry.all() {
            let this = Arc::clone(self);
            let adapter = Arc::clone(adapter);
            let child = cancel.child_token();
            names.push(name.clone());
            tasks.push(tokio::spawn(async move { this.run_platform(adapter, child).await.0 }));
        }

        let mut outcomes = BTreeMap::new();
        for (name, joined) in names.into_iter().zip(join_all(tasks).await) {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(platform = %name, error = %e, "Refresh task aborted");
                    let outcome = RefreshOutcome::failed(
                        &name,
                        format!("refresh task aborted: {e}"),
                        0,
                        self.clock.now(),
                    );
                    self.record(&outcome).await;
                    outcome
                }
            };
            outcomes.insert(name, outcome);
        }

        let failed = outcomes.values().filter(|o| !o.is_success()).count();
        info!(total = outcomes.len(), failed, "Refresh run finished");
        outcomes
    }

    /// Refresh a single platform by key.
    ///
    /// An unknown key fails with `NotFound` before any I/O. Fetch and
    /// reconcile failures are logged like any other attempt and then
    /// returned to the caller.
    #[instrument(skip(self, cancel))]
    pub async fn refresh_one(
        &self,
        platform: &str,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, RefreshError> {
        let adapter = self
            .registry
            .lookup(platform)
            .ok_or_else(|| NotFoundError::platform(platform))?;

        match self.run_platform(adapter, cancel.child_token()).await {
            (outcome, None) => Ok(outcome),
            (_, Some(err)) => Err(err),
        }
    }

    /// Fetch, reconcile and log one platform. Never fails: errors become
    /// a failed outcome, and are also handed back for `refresh_one`.
    async fn run_platform(
        &self,
        adapter: Arc<dyn SourceAdapter>,
        cancel: CancellationToken,
    ) -> (RefreshOutcome, Option<RefreshError>) {
        let platform = adapter.name();
        let started_at = self.clock.now();
        let timer = Instant::now();
        let ctx = FetchContext::new(cancel.clone(), started_at);
        let budget = adapter.fetch_timeout();

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout(budget, adapter.fetch(&ctx)) => {
                result.unwrap_or(Err(FetchError::Timeout(budget)))
            }
        };

        let result: Result<(usize, ReconcileCounts), RefreshError> = match fetched {
            Ok(drafts) => {
                let fetched = drafts.len();
                self
                    .reconciler
                    .reconcile(platform, drafts)
                    .await
                    .map(|counts| (fetched, counts))
                    .map_err(RefreshError::from)
            }
            Err(e) => Err(e.into()),
        };

        let duration_ms = timer.elapsed().as_millis() as u64;
        let (outcome, err) = match result {
            Ok((fetched, counts)) => (
                RefreshOutcome::success(platform, fetched, counts, duration_ms, started_at),
                None,
            ),
            Err(e) => {
                warn!(platform, error = %e, "Platform refresh failed");
                (RefreshOutcome::failed(platform, &e, duration_ms, started_at), Some(e))
            }
        };

        self.record(&outcome).await;
        (outcome, err)
    }

    /// Persist the log entry and report the outcome.
    async fn record(&self, outcome: &RefreshOutcome) {
        if let Err(e) = self.store.append_refresh_log(outcome, self.clock.now()).await {
            error!(platform = %outcome.platform, error = %e, "Failed to write refresh log entry");
        }
        self.telemetry.refresh_finished(outcome);
        info!(
            platform = %outcome.platform,
            status = %outcome.status,
            new = outcome.new_count,
            updated = outcome.updated_count,
            duration_ms = outcome.duration_ms,
            "Platform refresh recorded"
        );
    }
}
