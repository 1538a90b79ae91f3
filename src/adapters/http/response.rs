//! API Envelope - Uniform Success and Failure Bodies
//!
//! Success: `{code:"OK", msg, data, timestamp}`.
//! Failure: `{code, msg, timestamp, retry_after_secs?}`; rate-limit
//! denials also set the `Retry-After` header.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::domain::{
    FetchError, NotFoundError, PersistenceError, RateLimitError, RefreshError, SchedulerError,
};

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: &'static str,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Wrap `data` in a success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: "OK",
        msg: "success".to_string(),
        data: Some(data),
        timestamp: Utc::now().timestamp_millis(),
        retry_after_secs: None,
    })
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("rate limit exceeded")]
    RateLimited(Duration),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("{0}")]
    Internal(String),
}

/// Whole seconds to wait, rounded up so clients never retry early.
pub fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::Fetch(_) => "FETCH_FAILED",
            ApiError::Persistence(_) => "PERSISTENCE_FAILED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NotFound(e) => ApiError::NotFound(e),
            RefreshError::Fetch(e) => ApiError::Fetch(e),
            RefreshError::Persistence(e) => ApiError::Persistence(e),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NotFound(e) => ApiError::NotFound(e),
            invalid @ SchedulerError::InvalidSchedule { .. } => {
                ApiError::InvalidRequest(invalid.to_string())
            }
        }
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let retry = match &self {
            ApiError::RateLimited(wait) => Some(retry_after_secs(*wait)),
            _ => None,
        };
        let body = Envelope::<()> {
            code: self.code(),
            msg: self.to_string(),
            data: None,
            timestamp: Utc::now().timestamp_millis(),
            retry_after_secs: retry,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
        assert_eq!(retry_after_secs(Duration::from_millis(30_500)), 31);
    }

    #[test]
    fn rate_limited_sets_header() {
        let response = ApiError::RateLimited(Duration::from_millis(1500)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn unknown_platform_maps_to_not_found() {
        let err: ApiError = RefreshError::from(NotFoundError::platform("topcoder")).into();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
