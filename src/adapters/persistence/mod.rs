//! Persistence Adapters - Canonical Contest Store
//!
//! Implements the `ContestStore` port with a transactional in-memory
//! table. When a data directory is configured the table is mirrored to
//! an atomic JSON snapshot and refresh attempts to an append-only JSONL
//! file, both reloaded at startup.

pub mod memory;
pub mod refresh_log;
pub mod snapshot;

pub use memory::MemoryContestStore;
pub use refresh_log::RefreshLogFile;
pub use snapshot::{ContestSnapshot, SnapshotStore};
