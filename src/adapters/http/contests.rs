//! Contest Routes - Read-Only Queries over the Canonical Table

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::response::{ApiError, ok};
use crate::domain::contest::time_remaining;
use crate::domain::platform::{display_name, normalize_key};
use crate::domain::{Contest, ContestId, ContestStatus, NotFoundError};
use crate::ports::{ContestOrder, ContestQuery};

/// Default look-ahead of the contest list.
const DEFAULT_SPAN_DAYS: u64 = 30;
/// Finished contests returned by the status route.
const FINISHED_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ListContestsQuery {
    /// `YYYY-MM-DD` or RFC 3339; lower bound on start time.
    pub start: Option<String>,
    /// `YYYY-MM-DD` (whole day) or RFC 3339; upper bound on start time.
    pub end: Option<String>,
    pub platform: Option<String>,
    pub status: Option<String>,
}

/// Contest row as served to API callers.
#[derive(Debug, Clone, Serialize)]
pub struct ContestDto {
    #[serde(flatten)]
    pub contest: Contest,
    pub platform_display: String,
    pub time_remaining: String,
}

impl ContestDto {
    pub fn new(contest: Contest, now: DateTime<Utc>) -> Self {
        Self {
            platform_display: display_name(&contest.platform).to_string(),
            time_remaining: time_remaining(contest.start_time, contest.end_time, now),
            contest,
        }
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_contests))
        .route("/:id", get(get_contest))
        .route("/platform/:platform", get(contests_by_platform))
        .route("/status/:status", get(contests_by_status))
}

/// Parse a query bound. Bare dates snap to the start or end of that day (UTC).
pub fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ApiError::InvalidRequest(format!("'{raw}' is neither YYYY-MM-DD nor RFC 3339"))
    })?;
    day_bound(date, end_of_day)
}

fn day_bound(date: NaiveDate, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    if !end_of_day {
        return Ok(midnight);
    }
    midnight
        .checked_add_signed(TimeDelta::seconds(86_399))
        .ok_or_else(|| ApiError::InvalidRequest(format!("{date} has no representable end of day")))
}

fn parse_status(raw: &str) -> Result<ContestStatus, ApiError> {
    raw.parse().map_err(ApiError::InvalidRequest)
}

async fn query(state: &AppState, query: ContestQuery) -> Result<Vec<ContestDto>, ApiError> {
    let now = state.clock.now();
    let rows = state.store.list(&query).await?;
    Ok(rows.into_iter().map(|c| ContestDto::new(c, now)).collect())
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_contests(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListContestsQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let today = state.clock.now().date_naive();
    let start_from = match q.start.as_deref() {
        Some(raw) => parse_bound(raw, false)?,
        None => day_bound(today, false)?,
    };
    let start_to = match q.end.as_deref() {
        Some(raw) => parse_bound(raw, true)?,
        None => {
            let last = today
                .checked_add_days(Days::new(DEFAULT_SPAN_DAYS))
                .ok_or_else(|| {
                    ApiError::InvalidRequest("default window leaves the calendar".to_string())
                })?;
            day_bound(last, true)?
        }
    };
    if start_to < start_from {
        return Err(ApiError::InvalidRequest("end precedes start".to_string()));
    }

    let rows = query(
        &state,
        ContestQuery {
            platform: q.platform.as_deref().map(normalize_key).filter(|p| !p.is_empty()),
            status: q
                .status
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(parse_status)
                .transpose()?,
            start_from: Some(start_from),
            start_to: Some(start_to),
            order: ContestOrder::StartAsc,
            limit: None,
        },
    )
    .await?;
    Ok(ok(rows))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_contest(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let id: ContestId = raw
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("'{raw}' is not a contest id")))?;
    let contest = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| NotFoundError::contest(id))?;
    Ok(ok(ContestDto::new(contest, state.clock.now())))
}

/// Contests of one platform that have not started yet.
#[tracing::instrument(level = "debug", skip_all)]
async fn contests_by_platform(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let now = state.clock.now();
    let rows = query(
        &state,
        ContestQuery {
            platform: Some(normalize_key(&platform)),
            start_from: Some(now),
            ..ContestQuery::default()
        },
    )
    .await?;
    Ok(ok(rows))
}

/// Contests in one status; finished ones newest first, capped.
#[tracing::instrument(level = "debug", skip_all)]
async fn contests_by_status(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = parse_status(&raw)?;
    let (order, limit) = match status {
        ContestStatus::Finished => (ContestOrder::EndDesc, Some(FINISHED_LIMIT)),
        _ => (ContestOrder::StartAsc, None),
    };
    let rows = query(
        &state,
        ContestQuery {
            status: Some(status),
            order,
            limit,
            ..ContestQuery::default()
        },
    )
    .await?;
    Ok(ok(rows))
}
