//! Source HTTP Client - Paced, Cancellable Outbound Fetches
//!
//! Wraps reqwest with a per-adapter request pacer and maps every
//! transport or status failure onto [`FetchError`]. Each adapter builds
//! its own client; nothing here is shared between platforms.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::FetchError;
use crate::ports::DEFAULT_FETCH_TIMEOUT;

/// User agent some upstreams require before they serve JSON.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration for one adapter's outbound client.
#[derive(Debug, Clone)]
pub struct SourceClientConfig {
    /// Request timeout, also the adapter's fetch budget.
    pub timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Outbound requests per second.
    pub requests_per_second: u32,
}

impl Default for SourceClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: concat!("contest-calendar/", env!("CARGO_PKG_VERSION")).to_string(),
            requests_per_second: 1,
        }
    }
}

/// Paced HTTP client owned by a single source adapter.
pub struct SourceClient {
    /// Underlying HTTP client.
    http: Client,
    /// Outbound request pacer.
    pacer: DefaultDirectRateLimiter,
    /// Platform key, for log fields.
    platform: &'static str,
    timeout: Duration,
}

impl SourceClient {
    pub fn new(platform: &'static str, config: &SourceClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(2)
            .build()
            .with_context(|| format!("Failed to build HTTP client for {platform}"))?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            pacer: RateLimiter::direct(Quota::per_second(rps)),
            platform,
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return the body text.
    ///
    /// Waits for the pacer first; returns `Cancelled` as soon as `cancel`
    /// fires, whether that is while paced or mid-request.
    pub async fn get_text(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.send(url, headers) => result,
        }
    }

    async fn send(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, FetchError> {
        self.pacer.until_ready().await;

        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        debug!(platform = self.platform, url, "Fetching upstream listing");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(platform = self.platform, status = %status, "Upstream returned non-OK status");
            return Err(FetchError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let client = SourceClient::new("codeforces", &SourceClientConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Unroutable address: only the cancellation branch can complete.
        let result = client.get_text("http://10.255.255.1/", &[], &cancel).await;
        assert_eq!(result, Err(FetchError::Cancelled));
    }

    #[test]
    fn zero_rate_falls_back_to_one_per_second() {
        let config = SourceClientConfig {
            requests_per_second: 0,
            ..SourceClientConfig::default()
        };
        assert!(SourceClient::new("luogu", &config).is_ok());
    }
}
