//! Request handlers: parse, delegate to the core, shape the reply.

use crate::error::{reject, ApiError};
use crate::ApiContext;
use chrono::{DateTime, Utc};
use monitor::HealthStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use store::{EventFilter, MetricFilter};
use streams::StreamConfig;
use types::{AttrMap, Event, MetricKind};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// List reply wrapper: the payload plus how many items it holds.
#[derive(Debug, Serialize)]
struct ListResponse<T> {
    data: Vec<T>,
    meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
struct ResponseMeta {
    count: usize,
}

fn list_reply<T: Serialize>(data: Vec<T>) -> warp::reply::Response {
    let meta = ResponseMeta { count: data.len() };
    warp::reply::json(&ListResponse { data, meta }).into_response()
}

fn parse_instant(field: &'static str, value: &str) -> Result<DateTime<Utc>, Rejection> {
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| {
            reject(ApiError::Validation(format!(
                "invalid {field} instant {value:?}: {err}"
            )))
        })
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub async fn ingest_event(
    event: Event,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    if !ctx.limiter.check() {
        return Err(reject(ApiError::RateLimited(
            "ingest rate limit exceeded".to_string(),
        )));
    }

    let id = event.id.clone();
    ctx.engine
        .ingestion()
        .ingest_event(event)
        .map_err(|err| reject(ApiError::from_ingest(err)))?;

    let body = json!({ "id": id, "status": "created" });
    Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::CREATED).into_response())
}

pub async fn ingest_batch(
    events: Vec<Event>,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    if !ctx.limiter.check() {
        return Err(reject(ApiError::RateLimited(
            "ingest rate limit exceeded".to_string(),
        )));
    }
    if events.len() > ctx.batch_limit {
        return Err(reject(ApiError::Validation(format!(
            "batch of {} exceeds the limit of {}",
            events.len(),
            ctx.batch_limit
        ))));
    }

    let ingested = ctx
        .engine
        .ingestion()
        .ingest_batch(events)
        .map_err(|err| reject(ApiError::from_ingest(err)))?;

    let body = json!({ "ingested": ingested, "status": "created" });
    Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::CREATED).into_response())
}

/// Query-string filters for `GET /api/v1/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// One type or a comma-separated list.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub user: Option<String>,
    pub source: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EventQuery {
    fn into_filter(self) -> Result<EventFilter, Rejection> {
        let mut filter = EventFilter::default();
        if let Some(types) = self.event_type {
            for name in types.split(',').filter(|s| !s.is_empty()) {
                filter = filter.with_type(name);
            }
        }
        if let Some(user) = self.user {
            filter = filter.by_user(user);
        }
        if let Some(source) = self.source {
            filter = filter.by_source(source);
        }
        if let Some(from) = &self.from {
            filter.from = Some(parse_instant("from", from)?);
        }
        if let Some(to) = &self.to {
            filter.to = Some(parse_instant("to", to)?);
        }
        if let Some(limit) = self.limit {
            filter = filter.with_limit(limit);
        }
        if let Some(offset) = self.offset {
            filter = filter.with_offset(offset);
        }
        Ok(filter)
    }
}

pub async fn query_events(
    query: EventQuery,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    let filter = query.into_filter()?;
    let events = ctx.engine.event_store().query(&filter);
    Ok(list_reply(events))
}

pub async fn get_event(
    id: String,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    let event = ctx
        .engine
        .event_store()
        .get(&id)
        .map_err(|err| reject(ApiError::from_store(err)))?;
    Ok(warp::reply::json(&event).into_response())
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Query-string filters for `GET /api/v1/metrics`.
#[derive(Debug, Default, Deserialize)]
pub struct MetricQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub source: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl MetricQuery {
    fn into_filter(self) -> Result<MetricFilter, Rejection> {
        let mut filter = MetricFilter::default();
        if let Some(name) = self.name {
            filter = filter.by_name(name);
        }
        if let Some(kind) = &self.kind {
            let kind: MetricKind = serde_json::from_value(Value::String(kind.clone()))
                .map_err(|_| {
                    reject(ApiError::Validation(format!("unknown metric type {kind:?}")))
                })?;
            filter = filter.by_kind(kind);
        }
        if let Some(source) = self.source {
            filter = filter.by_source(source);
        }
        if let Some(from) = &self.from {
            filter.from = Some(parse_instant("from", from)?);
        }
        if let Some(to) = &self.to {
            filter.to = Some(parse_instant("to", to)?);
        }
        if let Some(limit) = self.limit {
            filter = filter.with_limit(limit);
        }
        if let Some(offset) = self.offset {
            filter = filter.with_offset(offset);
        }
        Ok(filter)
    }
}

pub async fn query_metrics(
    query: MetricQuery,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    let filter = query.into_filter()?;
    let metrics = ctx.engine.metric_store().query(&filter);
    Ok(list_reply(metrics))
}

/// Query string for `GET /api/v1/metrics/aggregate`. `name` is required;
/// `dimensions` is `key:value[,key:value...]`.
#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    pub name: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub dimensions: Option<String>,
}

fn parse_dimensions(raw: &str) -> Result<AttrMap, Rejection> {
    let mut dimensions = AttrMap::new();
    for pair in raw.split(',').filter(|s| !s.is_empty()) {
        let Some((key, value)) = pair.split_once(':') else {
            return Err(reject(ApiError::Validation(format!(
                "invalid dimension pair {pair:?}, expected key:value"
            ))));
        };
        dimensions.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(dimensions)
}

pub async fn aggregate_metrics(
    query: AggregateQuery,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    if query.name.trim().is_empty() {
        return Err(reject(ApiError::Validation(
            "name must be non-empty".to_string(),
        )));
    }
    let from = match &query.from {
        Some(from) => Some(parse_instant("from", from)?),
        None => None,
    };
    let to = match &query.to {
        Some(to) => Some(parse_instant("to", to)?),
        None => None,
    };
    let dimensions = match &query.dimensions {
        Some(raw) => Some(parse_dimensions(raw)?),
        None => None,
    };

    let aggregate =
        ctx.engine
            .metric_store()
            .aggregate(&query.name, from, to, dimensions.as_ref());
    Ok(warp::reply::json(&aggregate).into_response())
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateStreamRequest {
    pub name: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

fn default_buffer_size() -> usize {
    1_000
}

fn default_flush_interval_ms() -> u64 {
    1_000
}

fn default_max_subscribers() -> usize {
    16
}

pub async fn create_stream(
    request: CreateStreamRequest,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    if request.name.trim().is_empty() {
        return Err(reject(ApiError::Validation(
            "stream name must be non-empty".to_string(),
        )));
    }

    let config = StreamConfig {
        buffer_size: request.buffer_size,
        flush_interval: Duration::from_millis(request.flush_interval_ms.max(1)),
        max_subscribers: request.max_subscribers,
    };
    let stream = ctx
        .engine
        .create_stream(&request.name, config)
        .map_err(|err| reject(ApiError::from_stream(err)))?;

    let body = json!({ "name": stream.name(), "status": "created" });
    Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::CREATED).into_response())
}

pub async fn delete_stream(
    name: String,
    ctx: Arc<ApiContext>,
) -> Result<warp::reply::Response, Rejection> {
    ctx.engine
        .delete_stream(&name)
        .await
        .map_err(|err| reject(ApiError::from_stream(err)))?;
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT).into_response())
}

pub async fn list_streams(ctx: Arc<ApiContext>) -> Result<warp::reply::Response, Rejection> {
    Ok(list_reply(ctx.engine.list_streams()))
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

pub async fn engine_stats(ctx: Arc<ApiContext>) -> Result<warp::reply::Response, Rejection> {
    Ok(warp::reply::json(&ctx.engine.stats()).into_response())
}

pub async fn healthz(ctx: Arc<ApiContext>) -> Result<warp::reply::Response, Rejection> {
    Ok(health_reply(ctx.engine.monitor()))
}

pub fn health_reply(monitor: &monitor::Monitor) -> warp::reply::Response {
    let snapshot = monitor.check_health();
    let status = if snapshot.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    warp::reply::with_status(warp::reply::json(&snapshot), status).into_response()
}

pub async fn metrics_text(ctx: Arc<ApiContext>) -> Result<warp::reply::Response, Rejection> {
    Ok(prometheus_reply(ctx.engine.monitor()))
}

pub fn prometheus_reply(monitor: &monitor::Monitor) -> warp::reply::Response {
    warp::reply::with_header(
        monitor.render_prometheus(),
        "content-type",
        "text/plain; version=0.0.4",
    )
    .into_response()
}
