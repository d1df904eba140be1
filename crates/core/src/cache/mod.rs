//! SQLite-backed store for cache generations.
//!
//! A generation is a versioned bucket of response snapshots captured for a
//! fixed manifest. This module provides:
//!
//! - Generation lifecycle rows (`installing` → `ready`) with atomic commit
//! - Snapshot lookup by manifest key or resolved URL
//! - Explicit eviction of every generation except the current one
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheEntry, CachedResponse};
pub use generations::{GenerationId, GenerationInfo, GenerationState};
