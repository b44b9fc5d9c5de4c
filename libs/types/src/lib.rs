//! # Pulse Unified Types Library
//!
//! Shared vocabulary for the Pulse analytics platform: the events that flow
//! in at the ingestion boundary, the metrics derived from them, and the
//! windowed aggregates computed over those metrics.
//!
//! ## Design Philosophy
//!
//! - **Single type library**: every service and lib crate imports its wire
//!   and domain types from here, nothing redefines them locally.
//! - **Open event taxonomy**: the built-in event types cover the common
//!   cases; anything else round-trips through [`EventType::Custom`] instead
//!   of being rejected at the boundary.
//! - **Validation at admission**: [`Event::validate`] and
//!   [`Metric::validate`] are the single source of truth for what counts as
//!   a well-formed record. Stores and services call them, they never
//!   re-implement the rules.
//! - **Tagged attribute values**: free-form `data` / `dimensions` maps use
//!   `serde_json::Value` (null / bool / number / string / array / object),
//!   never stringly-typed blobs.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod metric;

pub use aggregate::AggregatedMetric;
pub use error::ValidationError;
pub use event::{Event, EventType};
pub use metric::{Metric, MetricKind};

/// Heterogeneous attribute map used for event `data` and metric
/// `dimensions`.
pub type AttrMap = serde_json::Map<String, serde_json::Value>;
