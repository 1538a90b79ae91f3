//! Health Checks - Liveness and Readiness Probes
//!
//! `/live` answers as long as the process serves HTTP. `/ready` also
//! requires the scheduler loop to be running and the contest store to
//! report healthy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use crate::ports::ContestStore;

/// Shared health state polled by readiness probes.
#[derive(Clone)]
pub struct HealthState {
    /// Set once the scheduler loop has started, cleared on shutdown.
    pub scheduler_running: Arc<AtomicBool>,
    /// Store whose health gates readiness.
    store: Arc<dyn ContestStore>,
}

impl HealthState {
    pub fn new(store: Arc<dyn ContestStore>) -> Self {
        Self {
            scheduler_running: Arc::new(AtomicBool::new(false)),
            store,
        }
    }

    pub fn set_scheduler_running(&self, running: bool) {
        self.scheduler_running.store(running, Ordering::Relaxed);
    }

    /// Ready to serve traffic.
    pub async fn is_ready(&self) -> bool {
        self.scheduler_running.load(Ordering::Relaxed) && self.store.is_healthy().await
    }

    /// `/live` and `/ready` routes bound to this state.
    pub fn routes(&self) -> Router {
        Router::new()
            .route("/live", get(liveness))
            .route("/ready", get(readiness))
            .with_state(self.clone())
    }
}

async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    if state.is_ready().await {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}
