//! Domain Layer - Contest Records, Platforms and Refresh Results
//!
//! Pure data and rules for the contest aggregator. No I/O here
//! (hexagonal architecture inner ring); everything is serializable
//! and testable in isolation.

pub mod contest;
pub mod error;
pub mod platform;
pub mod refresh;

pub use contest::{Contest, ContestDraft, ContestId, ContestStatus};
pub use error::{
    FetchError, NotFoundError, PersistenceError, RateLimitError, RefreshError, SchedulerError,
};
pub use platform::PlatformDescriptor;
pub use refresh::{ReconcileCounts, RefreshLogEntry, RefreshOutcome, RefreshStatus};
