//! Refresh Routes - Manual Triggers, Recent Attempts, Budget Usage
//!
//! Triggers are charged against the caller's refresh budget for the
//! target (`all` or one platform key) before any fetch starts.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{Extensions, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use super::middleware::actor_id;
use super::response::{ApiError, ok};
use crate::domain::NotFoundError;
use crate::domain::platform::normalize_key;
use crate::usecases::{ALL_PLATFORMS, RateLimitInfo, RefreshDecision};

/// Entries returned by the status route.
const RECENT_ATTEMPTS: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub platform: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LimitView {
    pub platform: String,
    #[serde(flatten)]
    pub info: RateLimitInfo,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(refresh_all))
        .route("/status", get(refresh_status))
        .route("/limit", get(limit_info))
        .route("/:platform", post(refresh_platform))
}

async fn charge(state: &AppState, actor: &str, target: &str) -> Result<(), ApiError> {
    match state.limiter.check_refresh_limit(actor, target).await? {
        RefreshDecision::Allowed => Ok(()),
        RefreshDecision::Denied { retry_after } => {
            warn!(actor, target, ?retry_after, "Refresh budget exhausted");
            Err(ApiError::RateLimited(retry_after))
        }
    }
}

#[tracing::instrument(level = "debug", skip_all)]
async fn refresh_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, ApiError> {
    let actor = actor_id(&headers, &extensions);
    charge(&state, &actor, ALL_PLATFORMS).await?;

    info!(actor = %actor, "Manual refresh of all platforms");
    let outcomes = state
        .scheduler
        .manual_refresh(ALL_PLATFORMS, &state.shutdown.child_token())
        .await?;
    Ok(ok(outcomes))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn refresh_platform(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, ApiError> {
    let key = normalize_key(&platform);
    if !state.scheduler.has_platform(&key) {
        return Err(NotFoundError::platform(platform).into());
    }
    let actor = actor_id(&headers, &extensions);
    charge(&state, &actor, &key).await?;

    info!(actor = %actor, platform = %key, "Manual platform refresh");
    let outcomes = state
        .scheduler
        .manual_refresh(&key, &state.shutdown.child_token())
        .await?;
    // Single target: unwrap the one-element list.
    let outcome = outcomes
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Internal("refresh produced no outcome".to_string()))?;
    Ok(ok(outcome))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn refresh_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let logs = state.store.recent_refresh_logs(RECENT_ATTEMPTS).await?;
    Ok(ok(logs))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn limit_info(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<impl IntoResponse, ApiError> {
    let platform = q
        .platform
        .as_deref()
        .map(normalize_key)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ALL_PLATFORMS.to_string());
    let actor = actor_id(&headers, &extensions);
    let info = state.limiter.refresh_limit_info(&actor, &platform).await?;
    Ok(ok(LimitView { platform, info }))
}
