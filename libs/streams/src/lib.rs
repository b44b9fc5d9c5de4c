//! # Pulse Streams
//!
//! Named buffered pub/sub pipes. Publishers push events into a stream's
//! internal buffer without ever blocking; a background fan-out loop drains
//! the buffer and delivers each event to every subscriber whose filter
//! predicate accepts it, over bounded per-subscriber queues.
//!
//! ## Delivery semantics
//!
//! - Per subscriber, delivered events are a filtered subsequence of
//!   published events in publication order. No ordering holds across
//!   subscribers.
//! - Overflow never blocks and never errors outward: a full internal
//!   buffer drops the *oldest* buffered event (`stream.dropped`), a full
//!   subscriber queue drops the event for that subscriber only
//!   (`stream.subscriber_dropped`).
//!
//! Streams are owned by a [`StreamRegistry`], the engine-facing map of
//! name -> running stream.

mod registry;
mod stream;

pub use registry::StreamRegistry;
pub use stream::{EventStream, StreamConfig, StreamState, StreamStats, Subscription};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream is not running")]
    NotRunning,

    #[error("stream already started")]
    AlreadyStarted,

    #[error("subscriber already exists: {0}")]
    SubscriberExists(String),

    #[error("max subscribers reached ({0})")]
    MaxSubscribersReached(usize),

    #[error("stream already exists: {0}")]
    StreamExists(String),

    #[error("stream not found: {0}")]
    StreamNotFound(String),
}

pub type Result<T> = std::result::Result<T, StreamError>;
