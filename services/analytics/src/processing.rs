//! Completion consumer: derived metrics into the store, events onto the
//! streams.

use monitor::{counters, Monitor};
use parking_lot::Mutex;
use std::sync::Arc;
use store::MetricStore;
use streams::StreamRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use types::{Event, Metric};
use worker_pool::{Completion, Task, WorkerPool};

/// What a processing task receives.
#[derive(Debug, Clone)]
pub enum TaskPayload {
    Event(Event),
    Batch(Vec<Event>),
}

/// What a processing task produces per event.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    pub event: Event,
    pub metrics: Vec<Metric>,
}

pub type AnalyticsPool = WorkerPool<TaskPayload, Vec<ProcessedEvent>>;
pub type AnalyticsTask = Task<TaskPayload, Vec<ProcessedEvent>>;

/// Consumes the worker pool's completion stream. Its own failures (a full
/// metric store, an invalid derived metric) are logged and counted but
/// never stop the loop; the loop only ends when the pool closes the
/// completion channel.
pub struct ProcessingService {
    metric_store: Arc<MetricStore>,
    streams: Arc<StreamRegistry>,
    monitor: Arc<Monitor>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessingService {
    pub fn new(
        metric_store: Arc<MetricStore>,
        streams: Arc<StreamRegistry>,
        monitor: Arc<Monitor>,
    ) -> Self {
        Self {
            metric_store,
            streams,
            monitor,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the consumer loop over the pool's completion receiver.
    pub fn start(&self, results: mpsc::Receiver<Completion<Vec<ProcessedEvent>>>) {
        let consumer = Consumer {
            metric_store: Arc::clone(&self.metric_store),
            streams: Arc::clone(&self.streams),
            monitor: Arc::clone(&self.monitor),
        };
        *self.handle.lock() = Some(tokio::spawn(consumer.run(results)));
    }

    /// Wait for the consumer to drain. The pool closing its result channel
    /// is what ends the loop, so call this after the pool has stopped.
    pub async fn stop(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "processing consumer join failed");
            }
        }
    }
}

struct Consumer {
    metric_store: Arc<MetricStore>,
    streams: Arc<StreamRegistry>,
    monitor: Arc<Monitor>,
}

impl Consumer {
    async fn run(self, mut results: mpsc::Receiver<Completion<Vec<ProcessedEvent>>>) {
        while let Some(completion) = results.recv().await {
            match completion.outcome {
                Ok(processed) => {
                    for item in processed {
                        self.handle_processed(item);
                    }
                }
                Err(err) => {
                    warn!(task_id = %completion.task_id, error = %err, "processing task failed");
                    self.monitor.inc(counters::PROCESSING_TASK_FAILURES);
                }
            }
        }
        debug!("processing consumer drained");
    }

    fn handle_processed(&self, processed: ProcessedEvent) {
        for metric in processed.metrics {
            if let Err(err) = self.metric_store.store(metric) {
                warn!(error = %err, "failed to store derived metric");
                self.monitor.inc(counters::PROCESSING_ERRORS);
            }
        }
        self.streams.publish_all(&processed.event);
        self.monitor.inc(counters::EVENTS_PROCESSED_TOTAL);
    }
}
