//! Typed execution events and the sinks that receive them.
//!
//! Event kinds emitted by the core:
//! - `task.attempt`, `task.cache_hit`, `task.cache_miss`,
//!   `task.cache_unavailable`, `task.exhausted`
//! - `pipeline.started`, `pipeline.state`, `pipeline.completed`,
//!   `pipeline.failed`
//! - `batch.started`, `batch.iteration_completed`, `batch.iteration_failed`,
//!   `batch.completed`

mod event;
mod record;
mod sink;

pub use event::Event;
pub use record::{AttemptOutcome, ExecutionRecord};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
