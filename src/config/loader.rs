//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use crate::domain::platform::normalize_key;
use crate::domain::PlatformDescriptor;
use crate::usecases::scheduler::parse_schedule;

/// Config path from `CONTEST_CALENDAR_CONFIG`, else `config.toml`.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
    let path = Path::new(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;

    info!(
        platforms = config.platform_descriptors().iter().filter(|d| d.active).count(),
        scheduler = config.scheduler.enabled,
        snapshot = config.persistence.snapshot,
        "Configuration loaded successfully"
    );

    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Cron expressions that parse (six fields, seconds first)
/// - Platform overrides naming a built-in adapter
/// - Positive limits, windows and timeouts
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Scheduler validation
    parse_schedule(&config.scheduler.full_refresh_cron).context("scheduler.full_refresh_cron")?;
    parse_schedule(&config.scheduler.status_cron).context("scheduler.status_cron")?;
    anyhow::ensure!(config.scheduler.tick_ms > 0, "scheduler.tick_ms must be positive");

    // Platform validation
    let known: Vec<String> = PlatformDescriptor::builtins().into_iter().map(|d| d.key).collect();
    for (i, platform) in config.platforms.iter().enumerate() {
        let key = normalize_key(&platform.key);
        anyhow::ensure!(
            known.contains(&key),
            "Platform {} ('{}') has no built-in adapter; known: {}",
            i,
            platform.key,
            known.join(", ")
        );
        anyhow::ensure!(
            config.platforms.iter().filter(|p| normalize_key(&p.key) == key).count() == 1,
            "Platform '{}' is configured more than once",
            key
        );
        if let Some(expr) = &platform.schedule {
            parse_schedule(expr).with_context(|| format!("platforms.{key}.schedule"))?;
        }
        if let Some(url) = &platform.base_url {
            anyhow::ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "Platform '{}' base_url must be http(s), got {}",
                key,
                url
            );
        }
    }

    // Source validation
    anyhow::ensure!(config.sources.timeout_seconds > 0, "sources.timeout_seconds must be positive");
    anyhow::ensure!(
        config.sources.requests_per_second > 0,
        "sources.requests_per_second must be positive"
    );

    // Rate limit validation
    let limits = &config.rate_limits;
    anyhow::ensure!(
        limits.api_limit > 0 && limits.api_window_seconds > 0,
        "API rate limit and window must be positive, got {} per {}s",
        limits.api_limit,
        limits.api_window_seconds
    );
    anyhow::ensure!(
        limits.refresh_limit > 0 && limits.refresh_window_seconds > 0,
        "Refresh rate limit and window must be positive, got {} per {}s",
        limits.refresh_limit,
        limits.refresh_window_seconds
    );

    // Persistence validation
    anyhow::ensure!(
        config.persistence.log_retention > 0,
        "persistence.log_retention must be positive"
    );
    if let Some(redis) = &config.redis {
        anyhow::ensure!(!redis.url.is_empty(), "redis.url must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn empty_file_yields_builtin_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.platform_descriptors().len(), 5);
        assert_eq!(config.scheduler.full_refresh_cron, "0 0 2 * * *");
        assert_eq!(config.rate_limits.api_policy().limit, 5);
        assert_eq!(config.rate_limits.refresh_policy().window.as_secs(), 600);
    }

    #[test]
    fn platform_overrides_apply_by_key() {
        let config = parse_config(
            r#"
            [[platforms]]
            key = "LeetCode"
            active = false

            [[platforms]]
            key = "luogu"
            schedule = "0 */30 * * * *"
            "#,
        )
        .unwrap();

        let descriptors = config.platform_descriptors();
        let leetcode = descriptors.iter().find(|d| d.key == "leetcode").unwrap();
        let luogu = descriptors.iter().find(|d| d.key == "luogu").unwrap();
        assert!(!leetcode.active);
        assert_eq!(luogu.schedule.as_deref(), Some("0 */30 * * * *"));
        assert_eq!(luogu.display_name, "洛谷");
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = parse_config("[[platforms]]\nkey = \"topcoder\"\n").unwrap_err();
        assert!(err.to_string().contains("topcoder"));
    }

    #[test]
    fn bad_cron_is_rejected() {
        assert!(parse_config("[scheduler]\nstatus_cron = \"every hour\"\n").is_err());
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(parse_config("[rate_limits]\napi_limit = 0\n").is_err());
    }
}
