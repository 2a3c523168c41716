//! Per-run state machine.

use crate::errors::InvalidTransitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single pipeline run.
///
/// A run of `n` tasks moves `Pending -> Running(0) -> ... -> Running(n - 1)`
/// and ends in `Succeeded` after the last task, or in `Failed` at the task
/// that was running.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Created, no task started yet.
    #[default]
    Pending,
    /// Executing the task at `task_index`.
    Running {
        /// Zero-based task position.
        task_index: usize,
    },
    /// Every task succeeded.
    Succeeded,
    /// The task at `task_index` was exhausted.
    Failed {
        /// Zero-based task position.
        task_index: usize,
        /// The failure message.
        cause: String,
    },
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running { task_index } => write!(f, "running({task_index})"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { task_index, .. } => write!(f, "failed({task_index})"),
        }
    }
}

impl RunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }

    /// Returns true if a run of `task_count` tasks may move to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self, task_count: usize) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running { task_index }) => *task_index == 0 && task_count > 0,
            (Self::Running { task_index: current }, Self::Running { task_index }) => {
                *task_index == current + 1 && *task_index < task_count
            }
            (Self::Running { task_index }, Self::Succeeded) => task_index + 1 == task_count,
            (Self::Running { task_index: current }, Self::Failed { task_index, .. }) => {
                current == task_index
            }
            _ => false,
        }
    }

    /// Moves to `next`, returning the previous state.
    pub fn transition_to(
        &mut self,
        next: Self,
        task_count: usize,
    ) -> Result<Self, InvalidTransitionError> {
        if !self.can_transition_to(&next, task_count) {
            return Err(InvalidTransitionError {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(std::mem::replace(self, next))
    }
}
