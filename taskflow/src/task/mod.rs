//! Tasks: named operations with retry and cache policies.
//!
//! Execution of a task wraps its operation in this order: cache lookup,
//! then the retry loop around the operation, then storing the result.

mod definition;
mod env;
mod operation;
mod policy;
mod retry;

pub use definition::{Task, TaskDescriptor};
pub use env::ExecutionEnv;
pub use operation::{FnOperation, Operation, Payload};
pub use policy::CachePolicy;
pub use retry::{BackoffStrategy, JitterStrategy, RetryPolicy, RetryState};
