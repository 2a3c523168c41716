//! Parent-flow driver: one pipeline run per parameter set.

mod driver;
mod report;

pub use driver::{BatchDriver, Invocation};
pub use report::{BatchReport, IterationOutcome};
