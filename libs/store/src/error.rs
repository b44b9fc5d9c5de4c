//! Store error types.

use thiserror::Error;
use types::ValidationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("invalid event: {0}")]
    InvalidEvent(#[source] ValidationError),

    #[error("invalid metric: {0}")]
    InvalidMetric(#[source] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Batch insertion failure. The elements before `index` were stored and
/// remain visible; `index` and everything after it were not.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("batch element at index {index} (id {id:?}) rejected: {source}")]
pub struct BatchError {
    pub index: usize,
    pub id: String,
    #[source]
    pub source: StoreError,
}
