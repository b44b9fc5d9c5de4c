//! Error kinds and their HTTP translation.

use analytics_service::IngestError;
use serde::Serialize;
use std::convert::Infallible;
use store::StoreError;
use streams::StreamError;
use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};
use worker_pool::PoolError;

/// Boundary error categories; one per row of the platform's error model.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Malformed input; reported to the caller, never retried.
    #[error("{0}")]
    Validation(String),

    /// Lookup miss.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate identifier or name collision.
    #[error("{0}")]
    Conflict(String),

    /// Operation attempted in the wrong lifecycle state.
    #[error("{0}")]
    State(String),

    /// Queue or buffer full; retry with backoff.
    #[error("{0}")]
    Capacity(String),

    /// Local rate limit exhausted.
    #[error("{0}")]
    RateLimited(String),

    /// Contained panic or unexpected failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::Conflict(_) => "ConflictError",
            ApiError::State(_) => "StateError",
            ApiError::Capacity(_) | ApiError::RateLimited(_) => "CapacityError",
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::State(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn from_ingest(err: IngestError) -> Self {
        let message = err.to_string();
        match err {
            IngestError::ServiceNotRunning => ApiError::State(message),
            IngestError::InvalidEvent(_) => ApiError::Validation(message),
            IngestError::DuplicateId(_) => ApiError::Conflict(message),
            IngestError::Store(_) => ApiError::Internal(message),
            IngestError::Batch(batch) => match &batch.source {
                StoreError::DuplicateId(_) => ApiError::Conflict(batch.to_string()),
                _ => ApiError::Validation(batch.to_string()),
            },
            IngestError::Submit(PoolError::Full) => ApiError::Capacity(message),
            IngestError::Submit(_) => ApiError::State(message),
        }
    }

    pub fn from_store(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(message),
            StoreError::DuplicateId(_) => ApiError::Conflict(message),
            StoreError::InvalidEvent(_) | StoreError::InvalidMetric(_) => {
                ApiError::Validation(message)
            }
        }
    }

    pub fn from_stream(err: StreamError) -> Self {
        let message = err.to_string();
        match err {
            StreamError::StreamExists(_) | StreamError::SubscriberExists(_) => {
                ApiError::Conflict(message)
            }
            StreamError::StreamNotFound(_) => ApiError::NotFound(message),
            StreamError::MaxSubscribersReached(_) => ApiError::Capacity(message),
            StreamError::NotRunning | StreamError::AlreadyStarted => ApiError::State(message),
        }
    }
}

impl warp::reject::Reject for ApiError {}

pub fn reject(err: ApiError) -> Rejection {
    warp::reject::custom(err)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

fn error_reply(kind: &'static str, message: String, status: StatusCode) -> warp::reply::Response {
    let body = ErrorBody {
        error: ErrorDetail { kind, message },
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Rejection recovery: translate every rejection into the JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    if let Some(api) = err.find::<ApiError>() {
        return Ok(error_reply(api.kind(), api.to_string(), api.status()));
    }
    if err.is_not_found() {
        return Ok(error_reply(
            "NotFoundError",
            "no such resource".to_string(),
            StatusCode::NOT_FOUND,
        ));
    }
    if let Some(body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(
            "ValidationError",
            body.to_string(),
            StatusCode::BAD_REQUEST,
        ));
    }
    if let Some(query) = err.find::<warp::reject::InvalidQuery>() {
        return Ok(error_reply(
            "ValidationError",
            query.to_string(),
            StatusCode::BAD_REQUEST,
        ));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(
            "ValidationError",
            "method not allowed".to_string(),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(
            "ValidationError",
            "payload too large".to_string(),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }

    error!(?err, "unhandled rejection");
    Ok(error_reply(
        "InternalError",
        "internal server error".to_string(),
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}
