//! # Pulse Worker Pool
//!
//! A bounded set of executors consuming a task queue and emitting
//! completions. The pool is generic over the task payload and the result
//! value, so it knows nothing about events or metrics.
//!
//! ## Contract
//!
//! - [`WorkerPool::submit`] never blocks: a full queue is a caller-visible
//!   [`PoolError::Full`], a stopped pool [`PoolError::NotRunning`].
//! - Handler panics are contained and surface as
//!   [`TaskError::Panicked`] completions; an executor never takes the pool
//!   down with it.
//! - [`WorkerPool::stop`] waits for in-flight tasks, drains and counts the
//!   never-run remainder, then closes the result channel, so every
//!   successful submit is accounted for in delivered + discarded.
//!
//! Submission order is preserved at the queue head; completion order is
//! not — with more than one executor, results interleave.

mod pool;
mod task;

pub use pool::{PoolConfig, PoolStats, ShutdownSummary, WorkerPool};
pub use task::{Completion, Task, TaskError};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool is not running")]
    NotRunning,

    #[error("worker pool is stopping")]
    Stopping,

    #[error("task queue is full")]
    Full,
}

pub type Result<T> = std::result::Result<T, PoolError>;
