//! Task cache trait and the in-memory implementation.

use super::{CacheEntry, Fingerprint};
use crate::errors::CacheUnavailableError;
use crate::utils::Timestamp;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

/// Storage backend for task results keyed by [`Fingerprint`].
///
/// Implementations must be safe for concurrent use. Concurrent stores to the
/// same fingerprint are last-write-wins.
#[async_trait]
pub trait TaskCache: Send + Sync {
    /// Returns the value of a live entry, or `None` when there is no entry
    /// or the entry has expired. Expired entries are evicted.
    async fn lookup(
        &self,
        fingerprint: &Fingerprint,
        now: Timestamp,
    ) -> Result<Option<serde_json::Value>, CacheUnavailableError>;

    /// Inserts or overwrites the entry for `fingerprint`.
    async fn store(
        &self,
        fingerprint: &Fingerprint,
        value: serde_json::Value,
        ttl: Duration,
        now: Timestamp,
    ) -> Result<(), CacheUnavailableError>;

    /// Removes every expired entry and returns how many were removed.
    async fn sweep(&self, now: Timestamp) -> Result<usize, CacheUnavailableError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), CacheUnavailableError>;
}

/// In-memory task cache.
#[derive(Debug, Default)]
pub struct InMemoryTaskCache {
    entries: DashMap<Fingerprint, CacheEntry>,
}

impl InMemoryTaskCache {
    /// Creates a new in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the raw entry for a fingerprint, ignoring expiration.
    #[must_use]
    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.entries.get(fingerprint).map(|e| e.value().clone())
    }
}

#[async_trait]
impl TaskCache for InMemoryTaskCache {
    async fn lookup(
        &self,
        fingerprint: &Fingerprint,
        now: Timestamp,
    ) -> Result<Option<serde_json::Value>, CacheUnavailableError> {
        if let Some(entry) = self.entries.get(fingerprint) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            // A concurrent store may have refreshed the entry in between.
            self.entries
                .remove_if(fingerprint, |_, entry| entry.is_expired(now));
        }
        Ok(None)
    }

    async fn store(
        &self,
        fingerprint: &Fingerprint,
        value: serde_json::Value,
        ttl: Duration,
        now: Timestamp,
    ) -> Result<(), CacheUnavailableError> {
        self.entries
            .insert(fingerprint.clone(), CacheEntry::new(value, ttl, now));
        Ok(())
    }

    async fn sweep(&self, now: Timestamp) -> Result<usize, CacheUnavailableError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn clear(&self) -> Result<(), CacheUnavailableError> {
        self.entries.clear();
        Ok(())
    }
}
