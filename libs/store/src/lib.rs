//! # Pulse In-Memory Stores
//!
//! Keyed, indexed, capacity-bounded stores for events and metrics.
//!
//! Both stores follow the same shape: a primary id -> record map plus
//! per-field secondary indices and a global time-ordered set, all guarded
//! by one reader/writer lock. Readers (get, query, aggregate) share the
//! lock; writers (store, delete, clear, eviction) exclude. Queries pick the
//! smallest applicable index, filter the remaining predicates linearly, and
//! materialize in ascending `(timestamp, id)` order so results are
//! deterministic even for equal timestamps.
//!
//! Capacity is enforced with time-based LRU: when a store is full the
//! oldest record by timestamp is evicted and the `store.evicted` counter is
//! incremented on the injected [`monitor::Monitor`].

mod error;
mod event_store;
mod filter;
mod metric_store;

pub use error::{BatchError, StoreError};
pub use event_store::EventStore;
pub use filter::{EventFilter, MetricFilter};
pub use metric_store::MetricStore;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Ordering key shared by the time index and every secondary index:
/// ascending timestamp, ties broken by identifier.
pub(crate) type TimeKey = (chrono::DateTime<chrono::Utc>, String);
