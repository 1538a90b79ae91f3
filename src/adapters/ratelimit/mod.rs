//! Rate-Limit Stores - Backends for the Sliding-Window Limiter
//!
//! `memory` keeps sorted sets in process; `redis` (behind the `redis`
//! cargo feature) shares them across instances.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryWindowStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisWindowStore;
