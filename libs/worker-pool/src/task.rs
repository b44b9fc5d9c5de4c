//! Units of work and their outcomes.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Failure modes of a task handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// A unit of work: an opaque payload plus the pure function that consumes
/// it. Owned by the pool after submission, executed exactly once.
pub struct Task<P, O> {
    pub id: String,
    pub payload: P,
    handler: Box<dyn FnOnce(P) -> std::result::Result<O, TaskError> + Send + 'static>,
}

impl<P, O> Task<P, O> {
    pub fn new(
        id: impl Into<String>,
        payload: P,
        handler: impl FnOnce(P) -> std::result::Result<O, TaskError> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            payload,
            handler: Box::new(handler),
        }
    }

    /// Run the handler with panic containment. A panicking handler yields
    /// an error completion instead of unwinding into the executor.
    pub(crate) fn run(self) -> Completion<O> {
        let Task { id, payload, handler } = self;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(move || handler(payload))) {
            Ok(result) => result,
            Err(panic) => Err(TaskError::Panicked(panic_message(&panic))),
        };
        Completion { task_id: id, outcome }
    }
}

impl<P, O> fmt::Debug for Task<P, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Outcome of exactly one task.
#[derive(Debug)]
pub struct Completion<O> {
    pub task_id: String,
    pub outcome: std::result::Result<O, TaskError>,
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
