//! Execution records emitted for every task attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The operation returned a value.
    Success,
    /// The operation returned an error.
    Failure,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Observability record of a single task attempt. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The task name.
    pub task_name: String,
    /// The 1-based attempt number.
    pub attempt: u32,
    /// The outcome of the attempt.
    pub outcome: AttemptOutcome,
    /// Wall time spent in the operation.
    pub duration_ms: f64,
    /// Error message for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Creates a record for a successful attempt.
    #[must_use]
    pub fn success(task_name: impl Into<String>, attempt: u32, duration_ms: f64) -> Self {
        Self {
            task_name: task_name.into(),
            attempt,
            outcome: AttemptOutcome::Success,
            duration_ms,
            error: None,
        }
    }

    /// Creates a record for a failed attempt.
    #[must_use]
    pub fn failure(
        task_name: impl Into<String>,
        attempt: u32,
        duration_ms: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            attempt,
            outcome: AttemptOutcome::Failure,
            duration_ms,
            error: Some(error.into()),
        }
    }
}
