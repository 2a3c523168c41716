//! Testing utilities for taskflow pipelines.
//!
//! Use together with [`crate::events::CollectingEventSink`] and
//! [`crate::utils::ManualClock`].

mod mocks;

pub use mocks::{CallCounter, MockOperation};
