//! Ingestion error surface.

use store::{BatchError, StoreError};
use thiserror::Error;
use types::ValidationError;
use worker_pool::PoolError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("ingestion service is not running")]
    ServiceNotRunning,

    #[error("invalid event: {0}")]
    InvalidEvent(#[source] ValidationError),

    #[error("duplicate event id: {0}")]
    DuplicateId(String),

    #[error("store rejected event: {0}")]
    Store(#[source] StoreError),

    #[error("{0}")]
    Batch(#[source] BatchError),

    #[error("failed to submit processing task: {0}")]
    Submit(#[source] PoolError),
}

impl IngestError {
    /// Collapse store-level rejections into the ingestion error kinds the
    /// boundary cares about.
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => IngestError::DuplicateId(id),
            StoreError::InvalidEvent(err) => IngestError::InvalidEvent(err),
            other => IngestError::Store(other),
        }
    }
}
