//! Batch driver running one pipeline per parameter set.

use super::{BatchReport, IterationOutcome};
use crate::errors::{IterationError, PipelineValidationError};
use crate::events::{Event, EventSink, NoOpEventSink};
use crate::pipeline::Pipeline;
use crate::task::Payload;
use futures::stream::{self, StreamExt};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, info_span, warn, Instrument};

/// A pipeline and the input to run it with.
pub struct Invocation<I, O> {
    /// The pipeline to run.
    pub pipeline: Pipeline<I, O>,
    /// Input of the first task.
    pub input: I,
}

impl<I, O> Invocation<I, O> {
    /// Creates a new invocation.
    pub fn new(pipeline: Pipeline<I, O>, input: I) -> Self {
        Self { pipeline, input }
    }
}

type Factory<P, I, O> =
    Arc<dyn Fn(&P) -> Result<Invocation<I, O>, PipelineValidationError> + Send + Sync>;

/// Runs a pipeline for every parameter set of a batch.
///
/// Failures are isolated: a failing element is recorded and the remaining
/// elements are still attempted. Outcomes are reported in input order, also
/// when several elements run concurrently.
pub struct BatchDriver<P, I, O> {
    name: String,
    factory: Factory<P, I, O>,
    concurrency: usize,
    iteration_timeout: Option<Duration>,
    sink: Arc<dyn EventSink>,
}

impl<P, I, O> Debug for BatchDriver<P, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDriver")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("iteration_timeout", &self.iteration_timeout)
            .finish_non_exhaustive()
    }
}

impl<P, I, O> BatchDriver<P, I, O>
where
    P: Debug + Send + Sync + 'static,
    I: Payload,
    O: Payload,
{
    /// Creates a driver that builds each element's pipeline with `factory`.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&P) -> Result<Invocation<I, O>, PipelineValidationError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            concurrency: 1,
            iteration_timeout: None,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Runs up to `n` elements at a time. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Fails an element whose pipeline run takes longer than `limit`.
    #[must_use]
    pub fn with_iteration_timeout(mut self, limit: Duration) -> Self {
        self.iteration_timeout = Some(limit);
        self
    }

    /// Sets the event sink for batch events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the batch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attempts every parameter set and reports all outcomes.
    pub async fn run_all(&self, params: impl IntoIterator<Item = P>) -> BatchReport<P, O> {
        let params: Vec<P> = params.into_iter().collect();
        let span = info_span!("batch", batch = %self.name, size = params.len());

        async move {
            info!(concurrency = self.concurrency, "Batch started");
            self.sink
                .emit(Event::BatchStarted {
                    batch: self.name.clone(),
                    size: params.len(),
                    concurrency: self.concurrency,
                })
                .await;

            let outcomes: Vec<IterationOutcome<P, O>> = stream::iter(params.into_iter().enumerate())
                .map(|(index, p)| self.run_one(index, p))
                .buffered(self.concurrency)
                .collect()
                .await;

            let report = BatchReport {
                batch: self.name.clone(),
                outcomes,
            };
            let failed = report.failed().len();
            if failed == 0 {
                info!(attempted = report.attempted(), "Batch completed");
            } else {
                warn!(attempted = report.attempted(), failed, "Batch completed with failures");
            }
            self.sink
                .emit(Event::BatchCompleted {
                    batch: self.name.clone(),
                    attempted: report.attempted(),
                    failed,
                })
                .await;
            report
        }
        .instrument(span)
        .await
    }

    async fn run_one(&self, index: usize, params: P) -> IterationOutcome<P, O> {
        let started = Instant::now();
        let result = self.invoke(&params).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => {
                info!(index, params = ?params, duration_ms, "Iteration completed");
                self.sink
                    .emit(Event::IterationCompleted {
                        batch: self.name.clone(),
                        index,
                        params: format!("{params:?}"),
                        duration_ms,
                    })
                    .await;
            }
            Err(err) => {
                warn!(index, params = ?params, error = %err, "Iteration failed");
                self.sink
                    .emit(Event::IterationFailed {
                        batch: self.name.clone(),
                        index,
                        params: format!("{params:?}"),
                        failed_task: err.failed_task().map(str::to_string),
                        error: err.to_string(),
                    })
                    .await;
            }
        }

        IterationOutcome {
            index,
            params,
            result,
            duration_ms,
        }
    }

    async fn invoke(&self, params: &P) -> Result<O, IterationError> {
        let Invocation { pipeline, input } = (self.factory)(params)?;
        let run = pipeline.run(input);

        match self.iteration_timeout {
            Some(limit) => match timeout(limit, run).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(IterationError::TimedOut {
                    pipeline: pipeline.name().to_string(),
                    timeout: limit,
                }),
            },
            None => Ok(run.await?),
        }
    }
}
