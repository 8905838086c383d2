//! Checksum-validated response cache.
//!
//! Entries are keyed by the SHA-256 of the raw query bytes and stamped with
//! the source-tree checksum they were computed against. A hit is only
//! returned when the stored checksum matches the current tree and the entry
//! has not expired; anything stale is deleted on detection.
//!
//! Two backends exist: a fast key-value store with native TTL (Redis) and a
//! durable embedded table (SQLite). Zero, one or both may be enabled; the
//! combination is resolved once at construction.

mod durable;
mod entry;
mod error;
mod fast;
mod manager;

pub use entry::{hash_query, CacheEntry};
pub use error::{CacheError, Result};
pub use manager::{CacheOptions, CacheStats, FastOptions, Manager};
