//! Status Recomputer - Time-Driven Lifecycle Pass
//!
//! Re-derives every stored contest's status from its time range so
//! rows advance from upcoming to running to finished even when no
//! adapter has seen them again. Idempotent and safe alongside refreshes.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::PersistenceError;
use crate::ports::{Clock, ContestStore, StatusTransitions, Telemetry};

pub struct StatusRecomputer {
    store: Arc<dyn ContestStore>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
}

impl StatusRecomputer {
    pub fn new(
        store: Arc<dyn ContestStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            store,
            clock,
            telemetry,
        }
    }

    /// Run one pass at the clock's current instant.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<StatusTransitions, PersistenceError> {
        let now = self.clock.now();
        let moved = self.store.recompute_statuses(now).await?;
        self.telemetry.statuses_recomputed(&moved);
        info!(
            running = moved.running,
            finished = moved.finished,
            upcoming = moved.upcoming,
            at = %now,
            "Contest statuses recomputed"
        );
        Ok(moved)
    }
}
