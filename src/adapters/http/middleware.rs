//! Request Guards - Caller Identity and Per-Client Budget
//!
//! The refresh group sits behind [`limit_per_client`]; a store failure
//! fails the request closed with 500.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Extensions, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::AppState;
use super::response::ApiError;
use crate::usecases::RefreshDecision;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const USER_ID: &str = "x-user-id";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address: first `X-Forwarded-For` hop, else the peer address.
pub fn client_id(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(first) = header_str(headers, FORWARDED_FOR).and_then(|v| v.split(',').next()) {
        return first.trim().to_string();
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Refresh-budget owner: `X-User-Id` when present, else the client address.
pub fn actor_id(headers: &HeaderMap, extensions: &Extensions) -> String {
    header_str(headers, USER_ID)
        .map(str::to_string)
        .unwrap_or_else(|| client_id(headers, extensions))
}

/// Deny with 429 once a client exceeds the API budget.
pub async fn limit_per_client(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_id(req.headers(), req.extensions());
    match state.limiter.check_api(&client).await {
        Ok(RefreshDecision::Allowed) => next.run(req).await,
        Ok(RefreshDecision::Denied { retry_after }) => {
            warn!(client = %client, path = %req.uri().path(), "API rate limit exceeded");
            ApiError::RateLimited(retry_after).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let mut ext = Extensions::new();
        ext.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(client_id(&headers, &ext), "203.0.113.7");
        assert_eq!(client_id(&HeaderMap::new(), &ext), "127.0.0.1");
        assert_eq!(client_id(&HeaderMap::new(), &Extensions::new()), "unknown");
    }

    #[test]
    fn actor_prefers_user_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID, HeaderValue::from_static("42"));
        assert_eq!(actor_id(&headers, &Extensions::new()), "42");
    }
}
