//! Route table: filters wired to handlers, with the panic guard and
//! rejection recovery applied.

use crate::error::{handle_rejection, reject, ApiError};
use crate::{handlers, ApiContext};
use futures::FutureExt;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// The complete route tree served on the API port.
pub fn routes(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    api_routes(ctx).recover(handle_rejection)
}

fn api_routes(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    let ingest_event = warp::path!("api" / "v1" / "events")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ctx(ctx.clone()))
        .and_then(|event, ctx| guarded(handlers::ingest_event(event, ctx)));

    let ingest_batch = warp::path!("api" / "v1" / "events" / "batch")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ctx(ctx.clone()))
        .and_then(|events, ctx| guarded(handlers::ingest_batch(events, ctx)));

    let query_events = warp::path!("api" / "v1" / "events")
        .and(warp::get())
        .and(warp::query::<handlers::EventQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(|query, ctx| guarded(handlers::query_events(query, ctx)));

    let get_event = warp::path!("api" / "v1" / "events" / String)
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(|id, ctx| guarded(handlers::get_event(id, ctx)));

    let query_metrics = warp::path!("api" / "v1" / "metrics")
        .and(warp::get())
        .and(warp::query::<handlers::MetricQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(|query, ctx| guarded(handlers::query_metrics(query, ctx)));

    let aggregate_metrics = warp::path!("api" / "v1" / "metrics" / "aggregate")
        .and(warp::get())
        .and(warp::query::<handlers::AggregateQuery>())
        .and(with_ctx(ctx.clone()))
        .and_then(|query, ctx| guarded(handlers::aggregate_metrics(query, ctx)));

    let create_stream = warp::path!("api" / "v1" / "streams")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_ctx(ctx.clone()))
        .and_then(|request, ctx| guarded(handlers::create_stream(request, ctx)));

    let delete_stream = warp::path!("api" / "v1" / "streams" / String)
        .and(warp::delete())
        .and(with_ctx(ctx.clone()))
        .and_then(|name, ctx| guarded(handlers::delete_stream(name, ctx)));

    let list_streams = warp::path!("api" / "v1" / "streams")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(|ctx| guarded(handlers::list_streams(ctx)));

    let engine_stats = warp::path!("api" / "v1" / "stats")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(|ctx| guarded(handlers::engine_stats(ctx)));

    let healthz = warp::path!("healthz")
        .and(warp::get())
        .and(with_ctx(ctx.clone()))
        .and_then(|ctx| guarded(handlers::healthz(ctx)));

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(|ctx| guarded(handlers::metrics_text(ctx)));

    ingest_batch
        .or(ingest_event)
        .unify()
        .or(get_event)
        .unify()
        .or(query_events)
        .unify()
        .or(aggregate_metrics)
        .unify()
        .or(query_metrics)
        .unify()
        .or(create_stream)
        .unify()
        .or(delete_stream)
        .unify()
        .or(list_streams)
        .unify()
        .or(engine_stats)
        .unify()
        .or(healthz)
        .unify()
        .or(metrics)
        .unify()
}

fn with_ctx(
    ctx: Arc<ApiContext>,
) -> impl Filter<Extract = (Arc<ApiContext>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Recovery middleware stand-in: a panicking handler becomes a 500 instead
/// of a dropped connection.
async fn guarded<F>(fut: F) -> Result<warp::reply::Response, Rejection>
where
    F: Future<Output = Result<warp::reply::Response, Rejection>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            error!("request handler panicked");
            Err(reject(ApiError::Internal("internal server error".to_string())))
        }
    }
}
