//! Error types for the taskflow framework.
//!
//! Failures are layered the same way execution is: a single attempt fails
//! with [`TaskExecutionError`], a task that used up its attempt budget fails
//! with [`TaskExhaustedError`], a pipeline run stops with
//! [`PipelineAbortedError`], and a batch that saw any failed run reports
//! [`BatchPartialFailure`] once every element has been attempted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Raised when the backing store of a task cache cannot be used.
///
/// Task execution treats this as a cache miss and proceeds without caching.
#[derive(Debug, Clone, Error)]
#[error("Cache unavailable ({backend}): {reason}")]
pub struct CacheUnavailableError {
    /// Name of the cache backend (e.g. "file").
    pub backend: String,
    /// What went wrong.
    pub reason: String,
}

impl CacheUnavailableError {
    /// Creates a new cache unavailable error.
    #[must_use]
    pub fn new(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            reason: reason.into(),
        }
    }
}

/// A single failed attempt of a task's operation.
#[derive(Debug, Error)]
#[error("Task '{task_name}' failed on attempt {attempt}: {cause}")]
pub struct TaskExecutionError {
    /// The task name.
    pub task_name: String,
    /// The 1-based attempt number.
    pub attempt: u32,
    /// The error returned by the operation.
    #[source]
    pub cause: anyhow::Error,
}

impl TaskExecutionError {
    /// Creates a new task execution error.
    #[must_use]
    pub fn new(task_name: impl Into<String>, attempt: u32, cause: anyhow::Error) -> Self {
        Self {
            task_name: task_name.into(),
            attempt,
            cause,
        }
    }
}

/// Every attempt allowed by the retry policy failed.
#[derive(Debug, Error)]
#[error("Task '{task_name}' exhausted {attempts} attempt(s): {}", .last.cause)]
pub struct TaskExhaustedError {
    /// The task name.
    pub task_name: String,
    /// How many times the operation was invoked.
    pub attempts: u32,
    /// The failure of the final attempt.
    #[source]
    pub last: TaskExecutionError,
}

impl TaskExhaustedError {
    /// Creates a new exhausted error from the last failed attempt.
    #[must_use]
    pub fn new(last: TaskExecutionError) -> Self {
        Self {
            task_name: last.task_name.clone(),
            attempts: last.attempt,
            last,
        }
    }
}

/// A pipeline run stopped because one of its tasks was exhausted.
#[derive(Debug, Error)]
#[error("Pipeline '{pipeline}' aborted at task #{task_index} '{task_name}': {source}")]
pub struct PipelineAbortedError {
    /// The pipeline name.
    pub pipeline: String,
    /// Zero-based position of the failing task.
    pub task_index: usize,
    /// The failing task.
    pub task_name: String,
    /// The underlying exhausted task.
    pub source: TaskExhaustedError,
}

impl PipelineAbortedError {
    /// Creates a new aborted error.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, task_index: usize, source: TaskExhaustedError) -> Self {
        Self {
            pipeline: pipeline.into(),
            task_index,
            task_name: source.task_name.clone(),
            source,
        }
    }

    /// Returns how many attempts the failing task made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.source.attempts
    }
}

/// Raised when a pipeline definition is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The tasks involved in the error.
    pub tasks: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tasks: Vec::new(),
        }
    }

    /// Sets the tasks involved.
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }
}

/// A pipeline run was asked to make a state change its state machine forbids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid run state transition: {from} -> {to}")]
pub struct InvalidTransitionError {
    /// The current state.
    pub from: String,
    /// The rejected target state.
    pub to: String,
}

/// Failure of a single element of a batch.
#[derive(Debug, Error)]
pub enum IterationError {
    /// The pipeline for this parameter set could not be built.
    #[error("Invalid pipeline: {0}")]
    Invalid(#[from] PipelineValidationError),

    /// The pipeline ran and aborted.
    #[error("{0}")]
    Aborted(#[from] PipelineAbortedError),

    /// The pipeline did not finish within the iteration deadline.
    #[error("Pipeline '{pipeline}' timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        /// The pipeline name.
        pipeline: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

impl IterationError {
    /// Returns the failing task, if the failure came from a task.
    #[must_use]
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            Self::Aborted(err) => Some(&err.task_name),
            Self::Invalid(_) | Self::TimedOut { .. } => None,
        }
    }
}

/// One failed element of a batch, as reported by [`BatchPartialFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedIteration {
    /// Position of the parameter set in the batch input.
    pub index: usize,
    /// Rendered parameter set.
    pub params: String,
    /// The failing task, if any.
    pub failed_task: Option<String>,
    /// The failure message.
    pub cause: String,
}

impl fmt::Display for FailedIteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.params, self.cause)
    }
}

/// One or more parameter sets of a batch failed.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error(
    "Batch '{batch}': {} of {attempted} parameter set(s) failed: [{}]",
    .failures.len(),
    .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
)]
pub struct BatchPartialFailure {
    /// The batch name.
    pub batch: String,
    /// Number of parameter sets attempted.
    pub attempted: usize,
    /// Every failed parameter set, in input order.
    pub failures: Vec<FailedIteration>,
}
