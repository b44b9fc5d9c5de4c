//! Server startup: the main API listener plus the bare metrics listener.

use crate::{handlers, routes, ApiContext};
use monitor::Monitor;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use warp::Filter;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: warp::Error,
    },
}

/// Bind and run the API server until the shutdown signal resolves.
pub async fn serve_api(
    addr: SocketAddr,
    ctx: Arc<ApiContext>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let routes = routes::routes(ctx);
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("API server listening on {bound}");
    server.await;
    Ok(())
}

/// Minimal observability surface on its own port: `/metrics` and
/// `/healthz` only, so scrapers never touch the API listener.
pub fn metrics_routes(
    monitor: Arc<Monitor>,
) -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone {
    let metrics_monitor = Arc::clone(&monitor);
    let metrics = warp::path!("metrics")
        .and(warp::get())
        .map(move || handlers::prometheus_reply(&metrics_monitor));

    let healthz = warp::path!("healthz")
        .and(warp::get())
        .map(move || handlers::health_reply(&monitor));

    metrics.or(healthz).unify()
}

pub async fn serve_metrics(
    addr: SocketAddr,
    monitor: Arc<Monitor>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let routes = metrics_routes(monitor).recover(not_found);
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("metrics server listening on {bound}");
    server.await;
    Ok(())
}

async fn not_found(_: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::with_status(
        "not found",
        warp::http::StatusCode::NOT_FOUND,
    ))
}
