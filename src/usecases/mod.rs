//! Use Cases Layer - Application Workflows
//!
//! Wires domain rules to the ports. Each use case owns its
//! collaborators explicitly; nothing reaches for a global.
//!
//! Use cases:
//! - `AdapterRegistry`: Platform key to source adapter lookup
//! - `Reconciler`: Dedup and upsert of one fetched batch
//! - `RefreshOrchestrator`: Concurrent fan-out over every adapter
//! - `StatusRecomputer`: Time-driven status pass
//! - `Scheduler`: Cron jobs and manual refresh triggers
//! - `SlidingWindowLimiter`: Request budgets per client and actor

pub mod orchestrator;
pub mod rate_limiter;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod status;

pub use orchestrator::RefreshOrchestrator;
pub use rate_limiter::{RateLimitInfo, RefreshDecision, SlidingWindowLimiter, WindowPolicy};
pub use reconciler::Reconciler;
pub use registry::AdapterRegistry;
pub use scheduler::{JobInfo, JobKind, Scheduler, SchedulerSettings, ALL_PLATFORMS};
pub use status::StatusRecomputer;
