//! # Pulse HTTP API
//!
//! The external boundary of the platform: warp routes translating HTTP
//! requests into core operations and core errors into status codes.
//!
//! ```text
//! POST   /api/v1/events             ingest one event         201
//! POST   /api/v1/events/batch       ingest a batch           201
//! GET    /api/v1/events             query events             200
//! GET    /api/v1/events/{id}        fetch one event          200
//! GET    /api/v1/metrics            query metrics            200
//! GET    /api/v1/metrics/aggregate  windowed aggregate       200
//! POST   /api/v1/streams            create stream            201
//! DELETE /api/v1/streams/{name}     delete stream            204
//! GET    /api/v1/streams            list streams             200
//! GET    /api/v1/stats              engine snapshot          200
//! GET    /healthz                   health snapshot          200/503
//! GET    /metrics                   Prometheus text          200
//! ```
//!
//! Error bodies are `{"error": {"kind", "message"}}` with the kind naming
//! one of the platform error categories (ValidationError, NotFoundError,
//! ConflictError, StateError, CapacityError, InternalError).

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod server;

use analytics_service::AnalyticsEngine;
use config::PulseConfig;
use rate_limit::IngestRateLimiter;
use std::sync::Arc;

/// Shared state handed to every handler.
pub struct ApiContext {
    pub engine: Arc<AnalyticsEngine>,
    pub limiter: IngestRateLimiter,
    /// Maximum elements accepted per batch request.
    pub batch_limit: usize,
}

impl ApiContext {
    pub fn new(engine: Arc<AnalyticsEngine>, config: &PulseConfig) -> Self {
        Self {
            engine,
            limiter: IngestRateLimiter::new(config.server.rate_limit_per_sec),
            batch_limit: config.analytics.batch_size,
        }
    }
}
