//! Cached task result with expiration metadata.

use crate::utils::{saturating_add, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored task output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The serialized task output.
    pub value: serde_json::Value,
    /// When the entry was stored.
    pub created_at: Timestamp,
    /// Last instant at which the entry is still live.
    pub expires_at: Timestamp,
}

impl CacheEntry {
    /// Creates an entry stored at `now` that stays live for `ttl`.
    #[must_use]
    pub fn new(value: serde_json::Value, ttl: Duration, now: Timestamp) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: saturating_add(now, ttl),
        }
    }

    /// Returns true while `now - created_at <= ttl`.
    #[must_use]
    pub fn is_live(&self, now: Timestamp) -> bool {
        now <= self.expires_at
    }

    /// Returns true once the entry must no longer be returned.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        !self.is_live(now)
    }
}
