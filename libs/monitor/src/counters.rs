//! Well-known counter names.
//!
//! Components share one registry; these constants keep the names aligned
//! between producers and the tests/dashboards reading them back.

/// Total events admitted by the ingestion service.
pub const EVENTS_INGESTED_TOTAL: &str = "events_ingested_total";

/// Per-type ingestion counters are `events_ingested_<type>`.
pub const EVENTS_INGESTED_PREFIX: &str = "events_ingested_";

/// Events fully processed (metrics derived and stored).
pub const EVENTS_PROCESSED_TOTAL: &str = "events_processed_total";

/// Events evicted from a store by the capacity policy.
pub const STORE_EVICTED: &str = "store.evicted";

/// Events dropped from a stream's internal buffer on overflow.
pub const STREAM_DROPPED: &str = "stream.dropped";

/// Events dropped for a single subscriber whose queue was full.
pub const STREAM_SUBSCRIBER_DROPPED: &str = "stream.subscriber_dropped";

/// Derived metrics the processing service failed to store.
pub const PROCESSING_ERRORS: &str = "processing.errors";

/// Processing tasks that returned an error (including contained panics).
pub const PROCESSING_TASK_FAILURES: &str = "processing.task_failures";
