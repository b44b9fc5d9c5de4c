//! # Pulse Analytics Service
//!
//! The composed core of the platform: the ingestion service that admits
//! events, the processing service that turns worker-pool completions into
//! stored metrics and stream publishes, the rule set that defines the
//! event -> metric derivation, and the engine that owns every lifecycle.
//!
//! Data flow for one event:
//!
//! ```text
//! IngestionService::ingest_event
//!     -> Event::validate
//!     -> EventStore::store
//!     -> WorkerPool::submit(processing task)
//!         executor: MetricRule::derive
//!     -> ProcessingService (completion consumer)
//!         -> MetricStore::store
//!         -> StreamRegistry::publish_all
//! ```
//!
//! Monitor counters are bumped at every stage; failures past admission are
//! logged and counted but never halt the pipeline.

mod engine;
mod error;
mod ingestion;
mod processing;
mod rules;

pub use engine::{AnalyticsEngine, EngineError, EngineStats, ShutdownReport};
pub use error::IngestError;
pub use ingestion::IngestionService;
pub use processing::{AnalyticsPool, AnalyticsTask, ProcessedEvent, ProcessingService, TaskPayload};
pub use rules::{default_rules, processing_task, EventCountRule, MetricRule, RuleSet};
