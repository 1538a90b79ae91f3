//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `SourceAdapter`: Fetch and normalize one upstream platform
//! - `ContestStore`: Transactional contest table and refresh log
//! - `WindowStore`: Sorted-set store behind the rate limiter
//! - `Clock`: Wall clock, replaceable in tests
//! - `Telemetry`: Observation hooks for metrics

pub mod clock;
pub mod contest_store;
pub mod source;
pub mod telemetry;
pub mod window_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contest_store::{ContestOrder, ContestQuery, ContestStore, StatusCount, StatusTransitions};
pub use source::{FetchContext, SourceAdapter, DEFAULT_FETCH_TIMEOUT};
pub use telemetry::{NoopTelemetry, Telemetry};
pub use window_store::WindowStore;
