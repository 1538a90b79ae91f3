//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml` (path
//! overridable with `CONTEST_CALENDAR_CONFIG`). Upstream URLs, cron
//! expressions and request budgets are externalized here; the domain
//! layer only carries the built-in defaults.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::sources::SourceClientConfig;
use crate::domain::platform::normalize_key;
use crate::domain::PlatformDescriptor;
use crate::usecases::{SchedulerSettings, WindowPolicy};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CONTEST_CALENDAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level service configuration.
///
/// Every section is optional; an empty file yields a working service
/// over all built-in platforms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Service identity, logging and HTTP bind address.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Outbound client settings shared by every source adapter.
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Per-platform overrides of the built-in descriptors.
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
    /// Cron cadence of the fixed jobs.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Request budgets.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    /// On-disk durability.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Shared window store for multi-instance deployments.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl AppConfig {
    /// Built-in descriptors with configured overrides applied.
    ///
    /// Overrides for keys without a built-in adapter are ignored here;
    /// validation rejects them before this is called.
    pub fn platform_descriptors(&self) -> Vec<PlatformDescriptor> {
        let mut descriptors = PlatformDescriptor::builtins();
        for cfg in &self.platforms {
            let key = normalize_key(&cfg.key);
            if let Some(d) = descriptors.iter_mut().find(|d| d.key == key) {
                cfg.apply(d);
            }
        }
        descriptors
    }

    pub fn source_client_config(&self) -> SourceClientConfig {
        SourceClientConfig {
            timeout: Duration::from_secs(self.sources.timeout_seconds),
            user_agent: self.sources.user_agent.clone(),
            requests_per_second: self.sources.requests_per_second,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            full_refresh: self.scheduler.full_refresh_cron.clone(),
            status_recompute: self.scheduler.status_cron.clone(),
            tick: Duration::from_millis(self.scheduler.tick_ms),
        }
    }
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Human-readable service name.
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level or full `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON log lines (false: compact text).
    #[serde(default = "default_true")]
    pub json_logs: bool,
    /// HTTP API bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            json_logs: true,
            bind_address: default_bind_address(),
        }
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Per-request timeout, also each adapter's fetch budget (seconds).
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Outbound pacing per adapter.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            user_agent: default_user_agent(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Override of one built-in platform. Unset fields keep the built-in value.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Built-in platform key (`codeforces`, `atcoder`, ...).
    pub key: String,
    pub display_name: Option<String>,
    pub base_url: Option<String>,
    pub active: Option<bool>,
    pub update_interval_secs: Option<u64>,
    /// Dedicated refresh cron for this platform.
    pub schedule: Option<String>,
}

impl PlatformConfig {
    fn apply(&self, d: &mut PlatformDescriptor) {
        if let Some(name) = &self.display_name {
            d.display_name.clone_from(name);
        }
        if let Some(url) = &self.base_url {
            d.base_url.clone_from(url);
        }
        if let Some(active) = self.active {
            d.active = active;
        }
        if let Some(secs) = self.update_interval_secs {
            d.update_interval_secs = secs;
        }
        if self.schedule.is_some() {
            d.schedule.clone_from(&self.schedule);
        }
    }
}

/// Scheduler configuration. Expressions have six fields, seconds first.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_full_refresh_cron")]
    pub full_refresh_cron: String,
    #[serde(default = "default_status_cron")]
    pub status_cron: String,
    /// Due-job check interval (milliseconds).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full_refresh_cron: default_full_refresh_cron(),
            status_cron: default_status_cron(),
            tick_ms: default_tick_ms(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Refresh API calls per client per window.
    #[serde(default = "default_api_limit")]
    pub api_limit: u64,
    #[serde(default = "default_api_window")]
    pub api_window_seconds: u64,
    /// Refresh triggers per actor and platform per window.
    #[serde(default = "default_refresh_limit")]
    pub refresh_limit: u64,
    #[serde(default = "default_refresh_window")]
    pub refresh_window_seconds: u64,
}

impl RateLimitConfig {
    pub fn api_policy(&self) -> WindowPolicy {
        WindowPolicy::new(self.api_limit, Duration::from_secs(self.api_window_seconds))
    }

    pub fn refresh_policy(&self) -> WindowPolicy {
        WindowPolicy::new(self.refresh_limit, Duration::from_secs(self.refresh_window_seconds))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            api_limit: default_api_limit(),
            api_window_seconds: default_api_window(),
            refresh_limit: default_refresh_limit(),
            refresh_window_seconds: default_refresh_window(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Directory for the contest snapshot and refresh log.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Mirror the contest table to disk.
    #[serde(default)]
    pub snapshot: bool,
    /// Refresh-log entries kept in memory.
    #[serde(default = "default_log_retention")]
    pub log_retention: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot: false,
            log_retention: default_log_retention(),
        }
    }
}

/// Redis window store configuration (requires the `redis` feature).
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

// Default value functions for serde

fn default_service_name() -> String {
    "contest-calendar".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("contest-calendar/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_full_refresh_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_status_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_api_limit() -> u64 {
    5
}

fn default_api_window() -> u64 {
    60
}

fn default_refresh_limit() -> u64 {
    10
}

fn default_refresh_window() -> u64 {
    600
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_retention() -> usize {
    1000
}

fn default_key_prefix() -> String {
    "contest-calendar".to_string()
}
