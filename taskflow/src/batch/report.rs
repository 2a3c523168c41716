//! Batch results.

use crate::errors::{BatchPartialFailure, FailedIteration, IterationError};
use std::fmt::{self, Debug};

/// Result of one element of a batch.
#[derive(Debug)]
pub struct IterationOutcome<P, O> {
    /// Position of the parameter set in the batch input.
    pub index: usize,
    /// The parameter set.
    pub params: P,
    /// Output of the pipeline, or why this element failed.
    pub result: Result<O, IterationError>,
    /// Wall time of this element.
    pub duration_ms: f64,
}

impl<P: Debug, O> IterationOutcome<P, O> {
    /// Returns true if the pipeline run succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Describes this element as a failure, if it failed.
    pub fn failure(&self) -> Option<FailedIteration> {
        self.result.as_ref().err().map(|err| FailedIteration {
            index: self.index,
            params: format!("{:?}", self.params),
            failed_task: err.failed_task().map(ToString::to_string),
            cause: err.to_string(),
        })
    }
}

/// Outcomes of every element of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<P, O> {
    /// The batch name.
    pub batch: String,
    /// One outcome per parameter set.
    pub outcomes: Vec<IterationOutcome<P, O>>,
}

impl<P: Debug, O> BatchReport<P, O> {
    /// Returns the number of parameter sets attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns the successful outcomes.
    pub fn succeeded(&self) -> Vec<&IterationOutcome<P, O>> {
        self.outcomes.iter().filter(|o| o.is_success()).collect()
    }

    /// Returns the failed outcomes.
    pub fn failed(&self) -> Vec<&IterationOutcome<P, O>> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    /// Returns true if every element succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(IterationOutcome::is_success)
    }

    /// Returns every failure of the batch, or `None` if all succeeded.
    pub fn partial_failure(&self) -> Option<BatchPartialFailure> {
        let failures: Vec<FailedIteration> =
            self.outcomes.iter().filter_map(IterationOutcome::failure).collect();
        if failures.is_empty() {
            return None;
        }
        Some(BatchPartialFailure {
            batch: self.batch.clone(),
            attempted: self.attempted(),
            failures,
        })
    }

    /// Returns the outputs in input order, or the failures.
    pub fn into_result(self) -> Result<Vec<O>, BatchPartialFailure> {
        if let Some(failure) = self.partial_failure() {
            return Err(failure);
        }
        Ok(self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect())
    }
}

impl<P: Debug, O> fmt::Display for BatchReport<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Batch '{}': {}/{} succeeded",
            self.batch,
            self.succeeded().len(),
            self.attempted()
        )?;
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(_) => writeln!(f, "  #{} {:?}: ok", outcome.index, outcome.params)?,
                Err(err) => writeln!(f, "  #{} {:?}: {err}", outcome.index, outcome.params)?,
            }
        }
        Ok(())
    }
}
