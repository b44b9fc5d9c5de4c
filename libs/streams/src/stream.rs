//! A single named stream and its fan-out loop.

use crate::{Result, StreamError};
use monitor::{counters, Monitor};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use types::Event;

/// Per-stream tuning.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Internal buffer capacity; also used for subscriber queues.
    pub buffer_size: usize,
    /// Fan-out wake-up cadence when no publishes arrive.
    pub flush_interval: Duration,
    pub max_subscribers: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1_000,
            flush_interval: Duration::from_secs(1),
            max_subscribers: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

/// Wire-friendly stream snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub name: String,
    pub state: StreamState,
    pub buffered: usize,
    pub subscribers: usize,
    pub buffer_size: usize,
    pub max_subscribers: usize,
}

type FilterFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

struct SubscriberEntry {
    filter: FilterFn,
    tx: mpsc::Sender<Event>,
}

/// Receiving half handed to a subscriber.
#[derive(Debug)]
pub struct Subscription {
    pub name: String,
    rx: mpsc::Receiver<Event>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

/// A named buffered pub/sub pipe.
pub struct EventStream {
    name: String,
    config: StreamConfig,
    state: Mutex<StreamState>,
    buffer: Mutex<VecDeque<Event>>,
    wake: Notify,
    subscribers: RwLock<HashMap<String, SubscriberEntry>>,
    quit: Mutex<Option<watch::Sender<bool>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    monitor: Arc<Monitor>,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl EventStream {
    pub fn new(name: impl Into<String>, config: StreamConfig, monitor: Arc<Monitor>) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(StreamState::NotStarted),
            buffer: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            subscribers: RwLock::new(HashMap::new()),
            quit: Mutex::new(None),
            handle: Mutex::new(None),
            monitor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            name: self.name.clone(),
            state: self.state(),
            buffered: self.buffer.lock().len(),
            subscribers: self.subscriber_count(),
            buffer_size: self.config.buffer_size,
            max_subscribers: self.config.max_subscribers,
        }
    }

    /// Register a named subscriber with a filter predicate. Allowed in any
    /// state so consumers can attach before the stream starts.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        filter: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let name = name.into();
        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&name) {
            return Err(StreamError::SubscriberExists(name));
        }
        if subscribers.len() >= self.config.max_subscribers {
            return Err(StreamError::MaxSubscribersReached(self.config.max_subscribers));
        }

        let (tx, rx) = mpsc::channel(self.config.buffer_size.max(1));
        subscribers.insert(
            name.clone(),
            SubscriberEntry {
                filter: Arc::new(filter),
                tx,
            },
        );
        debug!(stream = %self.name, subscriber = %name, "subscriber attached");
        Ok(Subscription { name, rx })
    }

    /// Detach a subscriber; returns whether it existed. Dropping the entry
    /// closes its delivery queue.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let removed = self.subscribers.write().remove(name).is_some();
        if removed {
            debug!(stream = %self.name, subscriber = %name, "subscriber detached");
        }
        removed
    }

    /// Non-blocking publish. On a full buffer the oldest buffered event is
    /// dropped and counted; publishing to a stream that is not running is
    /// an error, never a hang.
    pub fn publish(&self, event: Event) -> Result<()> {
        if self.state() != StreamState::Running {
            return Err(StreamError::NotRunning);
        }
        {
            let mut buffer = self.buffer.lock();
            if buffer.len() >= self.config.buffer_size {
                buffer.pop_front();
                self.monitor.inc(counters::STREAM_DROPPED);
            }
            buffer.push_back(event);
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Start the background fan-out loop. Only valid from `NotStarted` (or
    /// `Stopped`, for reuse).
    pub fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                StreamState::NotStarted | StreamState::Stopped => *state = StreamState::Running,
                StreamState::Running | StreamState::Stopping => {
                    return Err(StreamError::AlreadyStarted)
                }
            }
        }

        let (quit_tx, quit_rx) = watch::channel(false);
        *self.quit.lock() = Some(quit_tx);

        let stream = Arc::clone(self);
        let handle = tokio::spawn(stream.run(quit_rx));
        *self.handle.lock() = Some(handle);
        debug!(stream = %self.name, "stream started");
        Ok(())
    }

    /// Halt the fan-out loop, close all subscriber queues, and discard
    /// whatever is still buffered.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state != StreamState::Running {
                return;
            }
            *state = StreamState::Stopping;
        }

        if let Some(quit) = self.quit.lock().take() {
            let _ = quit.send(true);
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(stream = %self.name, error = %err, "fan-out task join failed");
            }
        }

        self.subscribers.write().clear();
        self.buffer.lock().clear();
        *self.state.lock() = StreamState::Stopped;
        debug!(stream = %self.name, "stream stopped");
    }

    async fn run(self: Arc<Self>, mut quit: watch::Receiver<bool>) {
        let mut flush = tokio::time::interval(self.config.flush_interval);
        flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = quit.changed() => break,
                _ = self.wake.notified() => self.drain(),
                // periodic flush tick; harmless when the buffer is empty
                _ = flush.tick() => self.drain(),
            }
        }
        debug!(stream = %self.name, "fan-out loop exited");
    }

    /// Deliver buffered events one at a time, preserving publication order
    /// per subscriber.
    fn drain(&self) {
        loop {
            let event = self.buffer.lock().pop_front();
            let Some(event) = event else { break };
            self.fan_out(&event);
        }
    }

    fn fan_out(&self, event: &Event) {
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (name, entry) in subscribers.iter() {
                if !(entry.filter)(event) {
                    continue;
                }
                match entry.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.monitor.inc(counters::STREAM_SUBSCRIBER_DROPPED);
                    }
                    Err(TrySendError::Closed(_)) => dead.push(name.clone()),
                }
            }
        }

        // drop subscribers whose receiving half is gone
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            for name in dead {
                subscribers.remove(&name);
                debug!(stream = %self.name, subscriber = %name, "removed closed subscriber");
            }
        }
    }
}
