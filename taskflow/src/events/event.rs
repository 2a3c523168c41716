//! Typed events emitted by tasks, pipeline runs, and batches.

use super::ExecutionRecord;
use crate::pipeline::RunState;
use serde::Serialize;
use uuid::Uuid;

/// Something that happened while executing tasks.
///
/// Serializes with a `kind` tag equal to [`Event::kind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum Event {
    /// One operation attempt finished.
    #[serde(rename = "task.attempt")]
    Attempt(ExecutionRecord),

    /// A live cached result was returned.
    #[serde(rename = "task.cache_hit")]
    CacheHit {
        /// The task name.
        task_name: String,
        /// Hex fingerprint of the input.
        fingerprint: String,
    },

    /// No usable cached result; the operation runs and its result is stored.
    #[serde(rename = "task.cache_miss")]
    CacheMiss {
        /// The task name.
        task_name: String,
        /// Hex fingerprint of the input.
        fingerprint: String,
        /// Set when an entry existed but could not be used.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// The cache could not be consulted; the task runs uncached.
    #[serde(rename = "task.cache_unavailable")]
    CacheUnavailable {
        /// The task name.
        task_name: String,
        /// Hex fingerprint of the input, if it could be computed.
        fingerprint: Option<String>,
        /// What went wrong.
        reason: String,
    },

    /// Every attempt of a task failed.
    #[serde(rename = "task.exhausted")]
    TaskExhausted {
        /// The task name.
        task_name: String,
        /// Attempts made.
        attempts: u32,
        /// The last failure.
        error: String,
    },

    /// A pipeline run started.
    #[serde(rename = "pipeline.started")]
    PipelineStarted {
        /// The pipeline name.
        pipeline: String,
        /// The run id.
        run_id: Uuid,
        /// Task names in execution order.
        tasks: Vec<String>,
        /// ISO-8601 start time.
        started_at: String,
    },

    /// A pipeline run changed state.
    #[serde(rename = "pipeline.state")]
    StateChanged {
        /// The pipeline name.
        pipeline: String,
        /// The run id.
        run_id: Uuid,
        /// The previous state.
        from: RunState,
        /// The new state.
        to: RunState,
    },

    /// Every task of a run succeeded.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted {
        /// The pipeline name.
        pipeline: String,
        /// The run id.
        run_id: Uuid,
        /// Wall time of the run.
        duration_ms: f64,
    },

    /// A run aborted at an exhausted task.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed {
        /// The pipeline name.
        pipeline: String,
        /// The run id.
        run_id: Uuid,
        /// Position of the failed task.
        task_index: usize,
        /// Name of the failed task.
        task_name: String,
        /// Attempts made by the failed task.
        attempts: u32,
        /// The failure message.
        error: String,
        /// Wall time of the run.
        duration_ms: f64,
    },

    /// A batch started.
    #[serde(rename = "batch.started")]
    BatchStarted {
        /// The batch name.
        batch: String,
        /// Number of parameter sets.
        size: usize,
        /// Elements run at the same time.
        concurrency: usize,
    },

    /// One batch element succeeded.
    #[serde(rename = "batch.iteration_completed")]
    IterationCompleted {
        /// The batch name.
        batch: String,
        /// Position of the element.
        index: usize,
        /// Rendered parameter set.
        params: String,
        /// Wall time of the element.
        duration_ms: f64,
    },

    /// One batch element failed.
    #[serde(rename = "batch.iteration_failed")]
    IterationFailed {
        /// The batch name.
        batch: String,
        /// Position of the element.
        index: usize,
        /// Rendered parameter set.
        params: String,
        /// The failing task, if the failure came from a task.
        failed_task: Option<String>,
        /// The failure message.
        error: String,
    },

    /// Every element of a batch was attempted.
    #[serde(rename = "batch.completed")]
    BatchCompleted {
        /// The batch name.
        batch: String,
        /// Elements attempted.
        attempted: usize,
        /// Elements that failed.
        failed: usize,
    },
}

impl Event {
    /// Dotted event kind, e.g. `task.attempt`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attempt(_) => "task.attempt",
            Self::CacheHit { .. } => "task.cache_hit",
            Self::CacheMiss { .. } => "task.cache_miss",
            Self::CacheUnavailable { .. } => "task.cache_unavailable",
            Self::TaskExhausted { .. } => "task.exhausted",
            Self::PipelineStarted { .. } => "pipeline.started",
            Self::StateChanged { .. } => "pipeline.state",
            Self::PipelineCompleted { .. } => "pipeline.completed",
            Self::PipelineFailed { .. } => "pipeline.failed",
            Self::BatchStarted { .. } => "batch.started",
            Self::IterationCompleted { .. } => "batch.iteration_completed",
            Self::IterationFailed { .. } => "batch.iteration_failed",
            Self::BatchCompleted { .. } => "batch.completed",
        }
    }

    /// Returns true for events that report a failure.
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Attempt(record) => record.error.is_some(),
            Self::CacheUnavailable { .. }
            | Self::TaskExhausted { .. }
            | Self::PipelineFailed { .. }
            | Self::IterationFailed { .. } => true,
            Self::BatchCompleted { failed, .. } => *failed > 0,
            _ => false,
        }
    }
}
