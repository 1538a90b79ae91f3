//! Contest Calendar - Entry Point
//!
//! Initializes configuration, logging, stores and source adapters,
//! then runs the cron scheduler and the HTTP API until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (or `$CONTEST_CALENDAR_CONFIG`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create metrics registry (Telemetry port)
//! 4. Open contest store (snapshot + refresh log when enabled)
//! 5. Open window store (Redis when configured, else in-process)
//! 6. Build source adapters into the registry
//! 7. Create orchestrator, status pass, scheduler and limiter
//! 8. Run one status pass before serving
//! 9. Start scheduler (fixed jobs + per-platform schedules)
//! 10. Serve HTTP API with /metrics, /live and /ready
//! 11. Wait for SIGINT -> graceful shutdown (cancel -> drain -> exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use contest_calendar::adapters::http::{self, AppState};
use contest_calendar::adapters::metrics::{HealthState, MetricsRegistry};
use contest_calendar::adapters::persistence::MemoryContestStore;
use contest_calendar::adapters::ratelimit::MemoryWindowStore;
use contest_calendar::adapters::sources::builtin_adapters;
use contest_calendar::config::{self, AppConfig};
use contest_calendar::ports::{Clock, ContestStore, SystemClock, Telemetry, WindowStore};
use contest_calendar::usecases::{
    AdapterRegistry, RefreshOrchestrator, Scheduler, SlidingWindowLimiter, StatusRecomputer,
};

/// Upper bound on draining the scheduler and server after SIGINT.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = config::loader::config_path();
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config);

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.service.bind_address,
        "Starting contest calendar"
    );

    // ── 3. Metrics registry (Telemetry port) ────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);
    let telemetry: Arc<dyn Telemetry> = metrics.clone();

    // ── 4. Contest store ────────────────────────────────────
    let store: Arc<dyn ContestStore> = if config.persistence.snapshot {
        Arc::new(
            MemoryContestStore::open(&config.persistence.data_dir, config.persistence.log_retention)
                .await
                .context("Failed to open contest snapshot")?,
        )
    } else {
        Arc::new(MemoryContestStore::new().with_log_capacity(config.persistence.log_retention))
    };

    // ── 5. Window store for the rate limiter ────────────────
    let windows = open_window_store(&config, Arc::clone(&clock)).await?;

    // ── 6. Source adapters ──────────────────────────────────
    let descriptors = config.platform_descriptors();
    let adapters = builtin_adapters(&descriptors, &config.source_client_config())
        .context("Failed to build source adapters")?;
    let registry = Arc::new(AdapterRegistry::with_adapters(adapters));
    info!(platforms = ?registry.names(), "Adapter registry ready");

    // ── 7. Usecases ─────────────────────────────────────────
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::clone(&telemetry),
    ));
    let status = Arc::new(StatusRecomputer::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        Arc::clone(&telemetry),
    ));
    let scheduler = Arc::new(Scheduler::new(
        orchestrator,
        Arc::clone(&status),
        Arc::clone(&clock),
        Arc::clone(&telemetry),
        config.scheduler_settings(),
    ));
    let limiter = Arc::new(
        SlidingWindowLimiter::new(windows, Arc::clone(&clock), Arc::clone(&telemetry))
            .with_policies(
                config.rate_limits.api_policy(),
                config.rate_limits.refresh_policy(),
            ),
    );

    // ── 8. Startup status pass ──────────────────────────────
    if let Err(e) = status.run().await {
        warn!(error = %e, "Startup status pass failed; continuing");
    }

    // ── 9. Scheduler ────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let health = HealthState::new(Arc::clone(&store));

    let scheduler_handle = if config.scheduler.enabled {
        let handle = scheduler
            .start(shutdown.child_token())
            .await
            .context("Failed to start scheduler")?;
        for d in descriptors.iter().filter(|d| d.active) {
            if let Some(expr) = &d.schedule {
                scheduler
                    .add_platform_job(&d.key, expr)
                    .await
                    .with_context(|| format!("Failed to schedule platform {}", d.key))?;
            }
        }
        Some(handle)
    } else {
        warn!("Scheduler disabled; refreshes run only on demand");
        None
    };
    health.set_scheduler_running(true);

    // ── 10. HTTP API ────────────────────────────────────────
    let state = Arc::new(AppState {
        store,
        scheduler,
        limiter,
        clock,
        metrics: Some(metrics),
        shutdown: shutdown.clone(),
    });
    let app = http::router(state, health.clone());

    let listener = tokio::net::TcpListener::bind(&config.service.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.service.bind_address))?;
    info!(addr = %config.service.bind_address, "HTTP API listening");

    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            error!(error = %e, "HTTP server failed");
        }
    });

    // ── 11. Wait for SIGINT ─────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    // 1. Readiness probe -> 503
    health.set_scheduler_running(false);

    // 2. Cancel the scheduler loop, in-flight refreshes and the server
    shutdown.cancel();

    // 3. Drain scheduler and server
    if let Some(handle) = scheduler_handle {
        if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            warn!("Scheduler did not stop within grace period");
        }
    }
    if tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await.is_err() {
        warn!("HTTP server did not drain within grace period");
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.service.json_logs {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[cfg(feature = "redis")]
async fn open_window_store(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn WindowStore>> {
    use contest_calendar::adapters::ratelimit::RedisWindowStore;

    match &config.redis {
        Some(redis) => {
            let store = RedisWindowStore::connect(&redis.url, Some(redis.key_prefix.clone()))
                .await
                .context("Failed to connect to Redis")?;
            info!("Rate limiter backed by Redis");
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryWindowStore::new(clock))),
    }
}

#[cfg(not(feature = "redis"))]
async fn open_window_store(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn WindowStore>> {
    if config.redis.is_some() {
        warn!("[redis] configured but the `redis` feature is off; using in-process window store");
    }
    Ok(Arc::new(MemoryWindowStore::new(clock)))
}
