//! Validation errors shared by events and metrics.

use thiserror::Error;

/// Rejection reasons produced by [`crate::Event::validate`] and
/// [`crate::Metric::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("attribute keys must be non-empty")]
    EmptyAttributeKey,

    #[error("metric value must be finite, got {0}")]
    NonFiniteValue(f64),
}
