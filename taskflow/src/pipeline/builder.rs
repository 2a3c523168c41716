//! Typed pipeline builder with validation.

use super::run::{Chain, Pipeline, RunScope};
use crate::cache::TaskCache;
use crate::errors::{PipelineAbortedError, PipelineValidationError};
use crate::events::EventSink;
use crate::task::{ExecutionEnv, Payload, Task, TaskDescriptor};
use crate::utils::Clock;
use futures::FutureExt;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Builder for pipelines from `I` to `O`.
///
/// Each call to [`then`](Self::then) appends a task whose input type is the
/// output type of the task before it, so a mistyped chain does not compile.
///
/// ```rust,ignore
/// let pipeline = PipelineBuilder::<String>::new("wordcount")
///     .then(Task::from_fn("split", |s: &String| Ok(s.split_whitespace().count())))
///     .then(Task::from_fn("double", |n: &usize| Ok(n * 2)))
///     .build()?;
/// ```
pub struct PipelineBuilder<I, O = I> {
    name: String,
    tasks: Vec<TaskDescriptor>,
    chain: Chain<I, O>,
    env: ExecutionEnv,
}

impl<I, O> fmt::Debug for PipelineBuilder<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl<I: Payload> PipelineBuilder<I, I> {
    /// Creates a new pipeline builder with no tasks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let chain: Chain<I, I> = Arc::new(|input: I, _scope: Arc<RunScope>| {
            async move { Ok::<_, PipelineAbortedError>(input) }.boxed()
        });
        Self {
            name: name.into(),
            tasks: Vec::new(),
            chain,
            env: ExecutionEnv::default(),
        }
    }
}

impl<I: Payload, O: Payload> PipelineBuilder<I, O> {
    /// Appends a task consuming the current output.
    #[must_use]
    pub fn then<T: Payload>(self, task: Task<O, T>) -> PipelineBuilder<I, T> {
        let index = self.tasks.len();
        let mut tasks = self.tasks;
        tasks.push(task.descriptor());

        let previous = self.chain;
        let task = Arc::new(task);
        let chain: Chain<I, T> = Arc::new(move |input: I, scope: Arc<RunScope>| {
            let previous = Arc::clone(&previous);
            let task = Arc::clone(&task);
            async move {
                let intermediate = (*previous)(input, Arc::clone(&scope)).await?;
                scope.enter(index);
                task.execute(&intermediate, scope.env())
                    .await
                    .map_err(|exhausted| PipelineAbortedError::new(scope.pipeline(), index, exhausted))
            }
            .boxed()
        });

        PipelineBuilder {
            name: self.name,
            tasks,
            chain,
            env: self.env,
        }
    }

    /// Replaces the whole execution environment.
    #[must_use]
    pub fn with_env(mut self, env: ExecutionEnv) -> Self {
        self.env = env;
        self
    }

    /// Sets the result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn TaskCache>) -> Self {
        self.env = self.env.with_cache(cache);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.env = self.env.with_sink(sink);
        self
    }

    /// Sets the clock used for cache expiration.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.env = self.env.with_clock(clock);
        self
    }

    /// Returns the descriptors of the tasks added so far.
    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    /// Validates and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline has no tasks, a task name is empty or
    /// repeated, a retry policy allows zero attempts, or a cache policy has a
    /// zero TTL.
    pub fn build(self) -> Result<Pipeline<I, O>, PipelineValidationError> {
        validate_tasks(&self.name, &self.tasks)?;
        Ok(Pipeline {
            name: self.name,
            tasks: self.tasks,
            chain: self.chain,
            env: self.env,
        })
    }
}

fn validate_tasks(pipeline: &str, tasks: &[TaskDescriptor]) -> Result<(), PipelineValidationError> {
    if tasks.is_empty() {
        return Err(PipelineValidationError::new(format!(
            "Pipeline '{pipeline}' has no tasks"
        )));
    }

    let unnamed: Vec<String> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.name.trim().is_empty())
        .map(|(i, _)| format!("#{i}"))
        .collect();
    if !unnamed.is_empty() {
        return Err(PipelineValidationError::new(format!(
            "Pipeline '{pipeline}' has tasks without a name"
        ))
        .with_tasks(unnamed));
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = tasks
        .iter()
        .filter(|t| !seen.insert(t.name.as_str()))
        .map(|t| t.name.clone())
        .collect();
    if !duplicates.is_empty() {
        duplicates.dedup();
        return Err(PipelineValidationError::new(format!(
            "Pipeline '{pipeline}' has duplicate task names: {}",
            duplicates.join(", ")
        ))
        .with_tasks(duplicates));
    }

    let no_attempts: Vec<String> = tasks
        .iter()
        .filter(|t| t.retry_policy.as_ref().is_some_and(|p| p.max_attempts == 0))
        .map(|t| t.name.clone())
        .collect();
    if !no_attempts.is_empty() {
        return Err(PipelineValidationError::new(format!(
            "Retry policy must allow at least one attempt: {}",
            no_attempts.join(", ")
        ))
        .with_tasks(no_attempts));
    }

    let zero_ttl: Vec<String> = tasks
        .iter()
        .filter(|t| t.cache_policy.is_some_and(|p| p.ttl.is_zero()))
        .map(|t| t.name.clone())
        .collect();
    if !zero_ttl.is_empty() {
        return Err(PipelineValidationError::new(format!(
            "Cache policy TTL must be positive: {}",
            zero_ttl.join(", ")
        ))
        .with_tasks(zero_ttl));
    }

    Ok(())
}
