//! Cache policy for tasks whose results may be reused.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reuse a task's result for identical inputs within `ttl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// How long a stored result stays live.
    pub ttl: Duration,
}

impl CachePolicy {
    /// Creates a cache policy with the given time-to-live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Creates a cache policy with a TTL in seconds.
    #[must_use]
    pub fn from_secs(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    /// Creates a cache policy that keeps results for one day.
    #[must_use]
    pub fn one_day() -> Self {
        Self::from_secs(24 * 60 * 60)
    }
}
