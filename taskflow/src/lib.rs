//! # Taskflow
//!
//! Linear task pipelines with per-task retries and input-keyed result
//! caching.
//!
//! Taskflow provides:
//!
//! - **Tasks**: named operations with an optional retry policy and an
//!   optional cache policy
//! - **Typed pipelines**: tasks chained output-to-input, checked at compile
//!   time and run strictly in order
//! - **Result caching**: fingerprints of task name and input, TTL-based
//!   expiry, in-memory or on-disk stores
//! - **Batch driver**: one pipeline run per parameter set with isolated
//!   failures
//! - **Event-driven observability**: execution records sent to an injected
//!   sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taskflow::prelude::*;
//!
//! let pipeline = PipelineBuilder::<SourceLocator>::new("etl")
//!     .then(Task::new("fetch", fetcher)
//!         .with_retry(RetryPolicy::new(3))
//!         .with_cache(CachePolicy::one_day()))
//!     .then(Task::new("clean", normalizer))
//!     .with_cache(cache)
//!     .build()?;
//!
//! let table = pipeline.run(locator).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod batch;
pub mod cache;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod task;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{BatchDriver, BatchReport, Invocation, IterationOutcome};
    pub use crate::cache::{FileTaskCache, Fingerprint, InMemoryTaskCache, TaskCache};
    pub use crate::errors::{
        BatchPartialFailure, CacheUnavailableError, FailedIteration, IterationError,
        PipelineAbortedError, PipelineValidationError, TaskExecutionError, TaskExhaustedError,
    };
    pub use crate::events::{
        CollectingEventSink, Event, EventSink, ExecutionRecord, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineRun, RunState};
    pub use crate::task::{
        BackoffStrategy, CachePolicy, ExecutionEnv, JitterStrategy, Operation, Payload,
        RetryPolicy, Task, TaskDescriptor,
    };
    pub use crate::utils::{Clock, ManualClock, SystemClock};
}
