//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (upstream HTTP, files on disk, Redis) and
//! serves the usecases over HTTP.
//!
//! Adapter categories:
//! - `sources`: One fetch-and-normalize adapter per contest platform
//! - `persistence`: In-memory contest table with JSON snapshot and JSONL log
//! - `ratelimit`: Sorted-set window stores (memory, Redis)
//! - `metrics`: Prometheus metrics export and health checks
//! - `http`: Axum API for contests, refreshes and administration

pub mod http;
pub mod metrics;
pub mod persistence;
pub mod ratelimit;
pub mod sources;
