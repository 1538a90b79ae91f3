//! HTTP API - Contest, Refresh and Admin Routes
//!
//! Axum router over the usecases layer. Every JSON body uses the
//! envelope from [`response`]; `/metrics`, `/live` and `/ready` answer
//! in plain text.
//!
//! Route groups:
//! - `/api/contests`: read-only queries
//! - `/api/refresh`: refresh triggers, guarded by the per-client limiter
//! - `/api/admin`: stats, logs, deletes and job management

pub mod admin;
pub mod contests;
pub mod middleware;
pub mod refresh;
pub mod response;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::ports::{Clock, ContestStore};
use crate::usecases::{Scheduler, SlidingWindowLimiter};

pub use response::{ApiError, Envelope};

/// Shared handles for every handler.
pub struct AppState {
    /// Contest rows and the refresh log.
    pub store: Arc<dyn ContestStore>,
    /// Job table and manual refresh entry point.
    pub scheduler: Arc<Scheduler>,
    /// Per-client API budget and per-actor refresh budget.
    pub limiter: Arc<SlidingWindowLimiter>,
    /// Source of "now" for default windows and `time_remaining`.
    pub clock: Arc<dyn Clock>,
    /// Rendered at `/metrics`; `None` answers 404.
    pub metrics: Option<Arc<MetricsRegistry>>,
    /// Cancelled on shutdown; manual refreshes run under a child token.
    pub shutdown: CancellationToken,
}

/// Full API router, health probes included.
pub fn router(state: Arc<AppState>, health: HealthState) -> Router {
    let refresh = refresh::routes().route_layer(axum::middleware::from_fn_with_state(
        Arc::clone(&state),
        middleware::limit_per_client,
    ));

    Router::new()
        .nest("/api/contests", contests::routes())
        .nest("/api/refresh", refresh)
        .nest("/api/admin", admin::routes())
        .route("/metrics", get(render_metrics))
        .with_state(state)
        .merge(health.routes())
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(metrics) = &state.metrics else {
        return (StatusCode::NOT_FOUND, "metrics disabled".to_string()).into_response();
    };
    match metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => ApiError::Internal(e.to_string()).into_response(),
    }
}
