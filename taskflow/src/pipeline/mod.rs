//! Pipeline building and execution.
//!
//! This module provides:
//! - A typed builder chaining tasks output-to-input
//! - Validation of task names and policies
//! - Sequential runs with a per-run state machine

mod builder;
mod run;
mod state;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use run::{Pipeline, PipelineRun, RunScope};
pub use state::RunState;
