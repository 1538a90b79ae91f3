//! Admin Routes - Stats, Refresh Logs, Deletes and Job Management

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, put};
use chrono::Months;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::response::{ApiError, ok};
use crate::domain::{ContestId, NotFoundError};

/// Stats cover contests starting within this many months or later.
const STATS_MONTHS: u32 = 3;
const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub schedule: String,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: ContestId,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contests/stats", get(contest_stats))
        .route("/contests/logs", get(refresh_logs))
        .route("/contests/:id", delete(delete_contest))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:platform", put(put_job).delete(delete_job))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn contest_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let now = state.clock.now();
    let since = now.checked_sub_months(Months::new(STATS_MONTHS)).unwrap_or(now);
    let stats = state.store.stats(since).await?;
    Ok(ok(stats))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn refresh_logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let logs = state.store.recent_refresh_logs(limit).await?;
    Ok(ok(logs))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn delete_contest(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ContestId = raw
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("'{raw}' is not a contest id")))?;
    if !state.store.delete(id).await? {
        return Err(NotFoundError::contest(id).into());
    }
    Ok(ok(Deleted { id }))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ok(state.scheduler.jobs().await)
}

#[tracing::instrument(level = "debug", skip_all)]
async fn put_job(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    axum::Json(body): axum::Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.scheduler.add_platform_job(&platform, &body.schedule).await?;
    Ok(ok(job))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.scheduler.remove_platform_job(&platform).await?;
    Ok(ok(platform))
}
