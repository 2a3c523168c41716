//! Destinations for [`Event`]s.

use super::{Event, ExecutionRecord};
use crate::pipeline::RunState;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn, Level};

/// Receives execution events.
///
/// Sinks are injected through [`crate::task::ExecutionEnv`] and the batch
/// driver. Emitting never fails; a sink that cannot deliver an event drops
/// it.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits `event` from async code.
    async fn emit(&self, event: Event) {
        self.try_emit(event);
    }

    /// Emits `event` without awaiting.
    fn try_emit(&self, event: Event);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: Event) {}
}

/// Forwards events to `tracing`.
///
/// Failure events are logged at `WARN`; the rest at the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Logs non-failure events at `level`; `WARN` and `ERROR` behave like `INFO`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: Event) {
        let kind = event.kind();
        let data = serde_json::to_string(&event).unwrap_or_default();
        if event.is_failure() {
            warn!(event = kind, data = %data, "Task event");
        } else if self.level >= Level::DEBUG {
            debug!(event = kind, data = %data, "Task event");
        } else {
            info!(event = kind, data = %data, "Task event");
        }
    }
}

/// Keeps every event in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event in emission order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Returns the events of one kind, e.g. `pipeline.failed`.
    pub fn of_kind(&self, kind: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }

    /// Counts the events of one kind.
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    /// Returns the execution records of every attempt.
    pub fn attempts(&self) -> Vec<ExecutionRecord> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Attempt(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns every run-state change as `(from, to)`.
    pub fn state_changes(&self) -> Vec<(RunState, RunState)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::StateChanged { from, to, .. } => Some((from.clone(), to.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}
