//! Built pipelines and their runs.

use super::RunState;
use crate::errors::PipelineAbortedError;
use crate::events::Event;
use crate::task::{ExecutionEnv, Payload, TaskDescriptor};
use crate::utils::iso_timestamp;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Composed task chain: takes the pipeline input and produces the output of
/// the last task.
pub(crate) type Chain<I, O> = Arc<
    dyn Fn(I, Arc<RunScope>) -> BoxFuture<'static, Result<O, PipelineAbortedError>> + Send + Sync,
>;

/// State shared by the tasks of one run.
pub struct RunScope {
    pipeline: String,
    run_id: Uuid,
    task_count: usize,
    env: ExecutionEnv,
    state: Mutex<RunState>,
}

impl fmt::Debug for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunScope")
            .field("pipeline", &self.pipeline)
            .field("run_id", &self.run_id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl RunScope {
    pub(crate) fn new(
        pipeline: impl Into<String>,
        run_id: Uuid,
        task_count: usize,
        env: ExecutionEnv,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            run_id,
            task_count,
            env,
            state: Mutex::new(RunState::Pending),
        }
    }

    /// Returns the pipeline name.
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Returns the run id.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the execution environment.
    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> RunState {
        self.state.lock().clone()
    }

    /// Marks the task at `task_index` as running.
    pub(crate) fn enter(&self, task_index: usize) {
        self.transition(RunState::Running { task_index });
    }

    pub(crate) fn transition(&self, next: RunState) {
        let result = self
            .state
            .lock()
            .transition_to(next.clone(), self.task_count);
        match result {
            Ok(previous) => {
                self.env.sink.try_emit(Event::StateChanged {
                    pipeline: self.pipeline.clone(),
                    run_id: self.run_id,
                    from: previous,
                    to: next,
                });
            }
            Err(err) => {
                error!(pipeline = %self.pipeline, run_id = %self.run_id, error = %err, "Rejected state change");
            }
        }
    }
}

/// Outcome of one pipeline execution.
#[derive(Debug)]
pub struct PipelineRun<O> {
    /// Fresh id of this run.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// Terminal state of the run.
    pub state: RunState,
    /// Wall time of the run.
    pub duration_ms: f64,
    /// Output of the last task, or why the run stopped.
    pub result: Result<O, PipelineAbortedError>,
}

impl<O> PipelineRun<O> {
    /// Returns true if every task succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Consumes the run and returns its result.
    pub fn into_result(self) -> Result<O, PipelineAbortedError> {
        self.result
    }
}

/// A validated, strictly sequential chain of tasks from `I` to `O`.
///
/// Built with [`super::PipelineBuilder`]. A pipeline can be run any number of
/// times; every run gets its own id and state.
pub struct Pipeline<I, O> {
    pub(crate) name: String,
    pub(crate) tasks: Vec<TaskDescriptor>,
    pub(crate) chain: Chain<I, O>,
    pub(crate) env: ExecutionEnv,
}

impl<I, O> Clone for Pipeline<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tasks: self.tasks.clone(),
            chain: Arc::clone(&self.chain),
            env: self.env.clone(),
        }
    }
}

impl<I, O> fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl<I: Payload, O: Payload> Pipeline<I, O> {
    /// Returns the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the task descriptors in execution order.
    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    /// Returns the execution environment.
    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    /// Runs every task in order and returns the last task's output.
    pub async fn run(&self, input: I) -> Result<O, PipelineAbortedError> {
        self.execute(input).await.result
    }

    /// Runs every task in order and reports the run.
    ///
    /// The first exhausted task aborts the run; no later task is invoked.
    pub async fn execute(&self, input: I) -> PipelineRun<O> {
        let run_id = Uuid::new_v4();
        let scope = Arc::new(RunScope::new(
            &self.name,
            run_id,
            self.tasks.len(),
            self.env.clone(),
        ));
        let span = info_span!("pipeline_run", pipeline = %self.name, run_id = %run_id);

        async move {
            info!(tasks = self.tasks.len(), "Pipeline started");
            self.env
                .sink
                .emit(Event::PipelineStarted {
                    pipeline: self.name.clone(),
                    run_id,
                    tasks: self.tasks.iter().map(|t| t.name.clone()).collect(),
                    started_at: iso_timestamp(),
                })
                .await;

            let started = Instant::now();
            let result = (*self.chain)(input, Arc::clone(&scope)).await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(_) => {
                    scope.transition(RunState::Succeeded);
                    info!(duration_ms, "Pipeline completed");
                    self.env
                        .sink
                        .emit(Event::PipelineCompleted {
                            pipeline: self.name.clone(),
                            run_id,
                            duration_ms,
                        })
                        .await;
                }
                Err(err) => {
                    scope.transition(RunState::Failed {
                        task_index: err.task_index,
                        cause: err.source.to_string(),
                    });
                    error!(
                        task = %err.task_name,
                        task_index = err.task_index,
                        attempts = err.attempts(),
                        duration_ms,
                        error = %err,
                        "Pipeline aborted"
                    );
                    self.env
                        .sink
                        .emit(Event::PipelineFailed {
                            pipeline: self.name.clone(),
                            run_id,
                            task_index: err.task_index,
                            task_name: err.task_name.clone(),
                            attempts: err.attempts(),
                            error: err.to_string(),
                            duration_ms,
                        })
                        .await;
                }
            }

            PipelineRun {
                run_id,
                pipeline: self.name.clone(),
                state: scope.state(),
                duration_ms,
                result,
            }
        }
        .instrument(span)
        .await
    }
}
