//! Input-keyed caching of task results.
//!
//! This module provides:
//! - Deterministic input fingerprints
//! - Cache entries with TTL-based expiration evaluated at lookup time
//! - In-memory and directory-backed cache stores

mod entry;
mod file;
mod fingerprint;
mod store;

pub use entry::CacheEntry;
pub use file::FileTaskCache;
pub use fingerprint::{to_canonical_json, Fingerprint};
pub use store::{InMemoryTaskCache, TaskCache};
