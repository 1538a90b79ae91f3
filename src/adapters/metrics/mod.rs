//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics rendered at `/metrics` and health check
//! endpoints (`/live`, `/ready`) served by the axum API router.

pub mod health;
pub mod prometheus;

pub use health::HealthState;
pub use prometheus::MetricsRegistry;
