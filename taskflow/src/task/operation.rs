//! The unit of work a task runs.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug};
use std::marker::PhantomData;

/// A value that can flow between tasks.
///
/// Payloads must be serializable so cacheable tasks can fingerprint their
/// inputs and persist their outputs.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// An operation turning an input into an output or a failure.
///
/// The input is borrowed so a retried operation always sees the same value.
#[async_trait]
pub trait Operation<I, O>: Send + Sync {
    /// Runs the operation once.
    async fn call(&self, input: &I) -> anyhow::Result<O>;
}

/// A simple function-based operation.
pub struct FnOperation<I, O, F>
where
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    func: F,
    _types: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> FnOperation<I, O, F>
where
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    /// Creates a new function-based operation.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

impl<I, O, F> Debug for FnOperation<I, O, F>
where
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").finish_non_exhaustive()
    }
}

#[async_trait]
impl<I, O, F> Operation<I, O> for FnOperation<I, O, F>
where
    I: Payload,
    O: Payload,
    F: Fn(&I) -> anyhow::Result<O> + Send + Sync,
{
    async fn call(&self, input: &I) -> anyhow::Result<O> {
        (self.func)(input)
    }
}
