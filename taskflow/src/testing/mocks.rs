//! Mock operations for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::task::{Operation, Payload};

/// A shared invocation counter.
///
/// Clones observe the same count, so a test can keep one while the
/// operation it belongs to moves into a pipeline.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count.
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Increments the count and returns the new value.
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// An operation with scripted failures that counts its calls.
#[derive(Debug, Clone)]
pub struct MockOperation<O> {
    output: Option<O>,
    failures: usize,
    message: String,
    delay: Option<Duration>,
    counter: CallCounter,
}

impl<O: Clone> MockOperation<O> {
    /// Creates an operation that always returns `output`.
    #[must_use]
    pub fn succeeding(output: O) -> Self {
        Self::flaky(0, output)
    }

    /// Creates an operation that fails `failures` times, then returns `output`.
    #[must_use]
    pub fn flaky(failures: usize, output: O) -> Self {
        Self {
            output: Some(output),
            failures,
            message: "mock failure".to_string(),
            delay: None,
            counter: CallCounter::new(),
        }
    }

    /// Creates an operation that always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            output: None,
            failures: usize::MAX,
            message: message.into(),
            delay: None,
            counter: CallCounter::new(),
        }
    }

    /// Sleeps for `delay` on every call before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns a handle to the call counter.
    #[must_use]
    pub fn counter(&self) -> CallCounter {
        self.counter.clone()
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.counter.get()
    }
}

#[async_trait]
impl<I, O> Operation<I, O> for MockOperation<O>
where
    I: Payload,
    O: Payload + Clone,
{
    async fn call(&self, _input: &I) -> anyhow::Result<O> {
        let call = self.counter.increment();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call <= self.failures {
            anyhow::bail!("{} (call {call})", self.message);
        }
        match &self.output {
            Some(output) => Ok(output.clone()),
            None => anyhow::bail!("{}", self.message),
        }
    }
}
