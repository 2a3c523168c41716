//! Collaborators shared by every task of a pipeline run.

use crate::cache::{InMemoryTaskCache, TaskCache};
use crate::events::{EventSink, NoOpEventSink};
use crate::utils::{Clock, SystemClock};
use std::fmt;
use std::sync::Arc;

/// The cache, event sink, and clock a task executes against.
///
/// Nothing here is global: pipelines hand their environment to each task,
/// and several pipelines may share one cache by cloning the `Arc`.
#[derive(Clone)]
pub struct ExecutionEnv {
    /// Result cache for tasks with a cache policy.
    pub cache: Arc<dyn TaskCache>,
    /// Receiver of execution events.
    pub sink: Arc<dyn EventSink>,
    /// Time source for cache expiration.
    pub clock: Arc<dyn Clock>,
}

impl Default for ExecutionEnv {
    fn default() -> Self {
        Self {
            cache: Arc::new(InMemoryTaskCache::new()),
            sink: Arc::new(NoOpEventSink),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for ExecutionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEnv")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl ExecutionEnv {
    /// Creates an environment with an in-memory cache, no-op sink, and the
    /// system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn TaskCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
