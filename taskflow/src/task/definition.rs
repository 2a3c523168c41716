//! Named tasks with retry and cache policies.

use super::{CachePolicy, ExecutionEnv, FnOperation, Operation, Payload, RetryPolicy, RetryState};
use crate::cache::Fingerprint;
use crate::errors::{TaskExecutionError, TaskExhaustedError};
use crate::events::{Event, ExecutionRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The static description of a task: its name and policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// The task name, unique within a pipeline.
    pub name: String,
    /// Retry policy, if any. No policy means a single attempt.
    pub retry_policy: Option<RetryPolicy>,
    /// Cache policy, if any.
    pub cache_policy: Option<CachePolicy>,
}

/// A named operation plus optional retry and cache policies.
pub struct Task<I, O> {
    name: String,
    operation: Arc<dyn Operation<I, O>>,
    retry_policy: Option<RetryPolicy>,
    cache_policy: Option<CachePolicy>,
}

impl<I, O> Clone for Task<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            operation: Arc::clone(&self.operation),
            retry_policy: self.retry_policy.clone(),
            cache_policy: self.cache_policy,
        }
    }
}

impl<I, O> fmt::Debug for Task<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("retry_policy", &self.retry_policy)
            .field("cache_policy", &self.cache_policy)
            .finish_non_exhaustive()
    }
}

enum CacheCheck<O> {
    Hit(O),
    Miss(Fingerprint),
    Unavailable,
}

impl<I: Payload, O: Payload> Task<I, O> {
    /// Creates a task with no retry and no cache policy.
    pub fn new(name: impl Into<String>, operation: impl Operation<I, O> + 'static) -> Self {
        Self {
            name: name.into(),
            operation: Arc::new(operation),
            retry_policy: None,
            cache_policy: None,
        }
    }

    /// Creates a task from a synchronous closure.
    pub fn from_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        Self::new(name, FnOperation::new(func))
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Sets the cache policy.
    #[must_use]
    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    /// Returns the cache policy.
    pub fn cache_policy(&self) -> Option<&CachePolicy> {
        self.cache_policy.as_ref()
    }

    /// Returns the static description of this task.
    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            name: self.name.clone(),
            retry_policy: self.retry_policy.clone(),
            cache_policy: self.cache_policy,
        }
    }

    /// Executes the task.
    ///
    /// With a cache policy, a live cached result for the same input is
    /// returned without invoking the operation. Otherwise the operation runs
    /// under the retry policy and a successful result is stored in the cache.
    /// A cache that cannot be read is treated as a miss and nothing is stored
    /// for this execution.
    pub async fn execute(&self, input: &I, env: &ExecutionEnv) -> Result<O, TaskExhaustedError> {
        let mut cache_slot = None;
        if let Some(policy) = self.cache_policy {
            match self.check_cache(input, env).await {
                CacheCheck::Hit(output) => return Ok(output),
                CacheCheck::Miss(fingerprint) => cache_slot = Some((fingerprint, policy.ttl)),
                CacheCheck::Unavailable => {}
            }
        }

        let output = self.run_with_retry(input, env).await?;

        if let Some((fingerprint, ttl)) = cache_slot {
            self.store(&fingerprint, &output, ttl, env).await;
        }

        Ok(output)
    }

    async fn check_cache(&self, input: &I, env: &ExecutionEnv) -> CacheCheck<O> {
        let fingerprint = match Fingerprint::compute(&self.name, input) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                self.cache_unavailable(env, None, &format!("cannot fingerprint input: {err}"))
                    .await;
                return CacheCheck::Unavailable;
            }
        };

        match env.cache.lookup(&fingerprint, env.clock.now()).await {
            Ok(Some(value)) => match serde_json::from_value::<O>(value) {
                Ok(output) => {
                    debug!(task = %self.name, fingerprint = %fingerprint.short(), "Cache hit");
                    env.sink
                        .emit(Event::CacheHit {
                            task_name: self.name.clone(),
                            fingerprint: fingerprint.as_str().to_string(),
                        })
                        .await;
                    CacheCheck::Hit(output)
                }
                Err(err) => {
                    // the store works, so the fresh result replaces the entry
                    warn!(
                        task = %self.name,
                        fingerprint = %fingerprint.short(),
                        error = %err,
                        "Cached value cannot be decoded, recomputing"
                    );
                    env.sink
                        .emit(Event::CacheMiss {
                            task_name: self.name.clone(),
                            fingerprint: fingerprint.as_str().to_string(),
                            reason: Some(format!("cannot decode cached value: {err}")),
                        })
                        .await;
                    CacheCheck::Miss(fingerprint)
                }
            },
            Ok(None) => {
                debug!(task = %self.name, fingerprint = %fingerprint.short(), "Cache miss");
                env.sink
                    .emit(Event::CacheMiss {
                        task_name: self.name.clone(),
                        fingerprint: fingerprint.as_str().to_string(),
                        reason: None,
                    })
                    .await;
                CacheCheck::Miss(fingerprint)
            }
            Err(err) => {
                self.cache_unavailable(env, Some(&fingerprint), &err.to_string())
                    .await;
                CacheCheck::Unavailable
            }
        }
    }

    async fn cache_unavailable(
        &self,
        env: &ExecutionEnv,
        fingerprint: Option<&Fingerprint>,
        reason: &str,
    ) {
        warn!(task = %self.name, reason = %reason, "Cache unavailable, executing without cache");
        env.sink
            .emit(Event::CacheUnavailable {
                task_name: self.name.clone(),
                fingerprint: fingerprint.map(|f| f.as_str().to_string()),
                reason: reason.to_string(),
            })
            .await;
    }

    async fn store(&self, fingerprint: &Fingerprint, output: &O, ttl: Duration, env: &ExecutionEnv) {
        let value = match serde_json::to_value(output) {
            Ok(value) => value,
            Err(err) => {
                warn!(task = %self.name, error = %err, "Cannot serialize result for caching");
                return;
            }
        };

        if let Err(err) = env.cache.store(fingerprint, value, ttl, env.clock.now()).await {
            warn!(task = %self.name, error = %err, "Failed to store result in cache");
        }
    }

    async fn run_with_retry(&self, input: &I, env: &ExecutionEnv) -> Result<O, TaskExhaustedError> {
        let max_attempts = self
            .retry_policy
            .as_ref()
            .map_or(1, RetryPolicy::effective_attempts);
        let mut state = RetryState::new();

        loop {
            let attempt = state.begin_attempt();
            let started = Instant::now();
            let result = self.operation.call(input).await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(output) => {
                    debug!(task = %self.name, attempt, duration_ms, "Attempt succeeded");
                    let record = ExecutionRecord::success(&self.name, attempt, duration_ms);
                    env.sink.emit(Event::Attempt(record)).await;
                    return Ok(output);
                }
                Err(cause) => {
                    let record =
                        ExecutionRecord::failure(&self.name, attempt, duration_ms, format!("{cause:#}"));
                    env.sink.emit(Event::Attempt(record)).await;
                    let failure = TaskExecutionError::new(&self.name, attempt, cause);

                    if state.is_exhausted(max_attempts) {
                        warn!(task = %self.name, attempts = attempt, error = %failure, "Task exhausted");
                        let exhausted = TaskExhaustedError::new(failure);
                        env.sink
                            .emit(Event::TaskExhausted {
                                task_name: self.name.clone(),
                                attempts: exhausted.attempts,
                                error: exhausted.to_string(),
                            })
                            .await;
                        return Err(exhausted);
                    }

                    debug!(task = %self.name, attempt, max_attempts, error = %failure, "Attempt failed, retrying");
                    if let Some(policy) = &self.retry_policy {
                        let delay = policy.delay_before_retry(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
    }
}
