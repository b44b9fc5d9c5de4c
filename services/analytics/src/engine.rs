//! Lifecycle owner for the pool, stores, streams, and services.

use crate::ingestion::IngestionService;
use crate::processing::{AnalyticsPool, ProcessingService, TaskPayload};
use crate::rules::{default_rules, processing_task, RuleSet};
use config::PulseConfig;
use monitor::{AlertEvaluator, Monitor};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use store::{EventStore, MetricStore};
use streams::{EventStream, StreamConfig, StreamRegistry, StreamStats};
use thiserror::Error;
use tracing::{info, warn};
use types::Event;
use worker_pool::{PoolConfig, PoolError, PoolStats, ShutdownSummary, WorkerPool};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("analytics engine is not running")]
    NotRunning,

    #[error("failed to submit processing task: {0}")]
    Submit(#[source] PoolError),
}

/// Composite snapshot served by the stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub running: bool,
    pub pool: PoolStats,
    pub events_stored: usize,
    pub metrics_stored: usize,
    pub streams: Vec<StreamStats>,
}

/// Outcome of [`AnalyticsEngine::shutdown`]. `complete` is false when the
/// deadline elapsed before quiescence.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub complete: bool,
    pub pool: Option<ShutdownSummary>,
}

/// Owns the worker pool and the stream registry, wires the ingestion and
/// processing services together, and drives every start/stop transition.
pub struct AnalyticsEngine {
    pool: Arc<AnalyticsPool>,
    streams: Arc<StreamRegistry>,
    event_store: Arc<EventStore>,
    metric_store: Arc<MetricStore>,
    monitor: Arc<Monitor>,
    ingestion: Arc<IngestionService>,
    processing: ProcessingService,
    rules: Arc<RuleSet>,
    evaluator: Mutex<Option<AlertEvaluator>>,
    health_check_interval: Duration,
    running: AtomicBool,
}

impl AnalyticsEngine {
    pub fn new(config: &PulseConfig) -> Self {
        let monitor = Arc::new(Monitor::new(config.monitoring.alert_thresholds.clone()));
        let event_store = Arc::new(EventStore::new(config.analytics.cache_size, monitor.clone()));
        let metric_store = Arc::new(MetricStore::new(config.analytics.cache_size, monitor.clone()));
        let pool: Arc<AnalyticsPool> =
            Arc::new(WorkerPool::new(PoolConfig::new(config.analytics.workers)));
        let streams = Arc::new(StreamRegistry::new(monitor.clone()));
        let rules = default_rules();

        let ingestion = Arc::new(IngestionService::new(
            Arc::clone(&event_store),
            Arc::clone(&pool),
            Arc::clone(&monitor),
            Arc::clone(&rules),
        ));
        let processing = ProcessingService::new(
            Arc::clone(&metric_store),
            Arc::clone(&streams),
            Arc::clone(&monitor),
        );

        Self {
            pool,
            streams,
            event_store,
            metric_store,
            monitor,
            ingestion,
            processing,
            rules,
            evaluator: Mutex::new(None),
            health_check_interval: config.monitoring.health_check_interval(),
            running: AtomicBool::new(false),
        }
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.event_store
    }

    pub fn metric_store(&self) -> &Arc<MetricStore> {
        &self.metric_store
    }

    pub fn ingestion(&self) -> &Arc<IngestionService> {
        &self.ingestion
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Boot order: pool, processing consumer, alert evaluator, ingestion.
    /// Idempotent-safe; the first caller wins.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pool.start();
        if let Some(results) = self.pool.take_results() {
            self.processing.start(results);
        }
        *self.evaluator.lock() = Some(self.monitor.spawn_evaluator(self.health_check_interval));
        self.ingestion.start();
        self.monitor.set_engine_running(true);
        info!("analytics engine started");
    }

    /// Submit a processing task for one event, bypassing admission (the
    /// event is not stored). Fails before `start`.
    pub fn process_event(&self, event: Event) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::NotRunning);
        }
        self.pool
            .submit(processing_task(
                Arc::clone(&self.rules),
                TaskPayload::Event(event),
            ))
            .map_err(EngineError::Submit)
    }

    pub fn create_stream(
        &self,
        name: &str,
        config: StreamConfig,
    ) -> Result<Arc<EventStream>, streams::StreamError> {
        self.streams.create(name, config)
    }

    pub fn get_stream(&self, name: &str) -> Option<Arc<EventStream>> {
        self.streams.get(name)
    }

    pub async fn delete_stream(&self, name: &str) -> Result<(), streams::StreamError> {
        self.streams.delete(name).await
    }

    pub fn list_streams(&self) -> Vec<StreamStats> {
        self.streams.list()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            running: self.is_running(),
            pool: self.pool.stats(),
            events_stored: self.event_store.len(),
            metrics_stored: self.metric_store.len(),
            streams: self.streams.list(),
        }
    }

    /// Teardown in reverse boot order, bounded by `deadline`: ingestion
    /// stops admitting, streams stop and close their subscriber queues,
    /// the pool drains in-flight work, the processing consumer finishes,
    /// the alert ticker halts. Deadline expiry yields a partial report
    /// instead of hanging.
    pub async fn shutdown(&self, deadline: Duration) -> ShutdownReport {
        if !self.running.swap(false, Ordering::SeqCst) {
            return ShutdownReport {
                complete: true,
                pool: None,
            };
        }
        self.monitor.set_engine_running(false);
        self.ingestion.stop();

        let sequence = async {
            self.streams.stop_all().await;
            let summary = match self.pool.stop().await {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!(error = %err, "pool was not running at shutdown");
                    None
                }
            };
            self.processing.stop().await;
            let evaluator = self.evaluator.lock().take();
            if let Some(evaluator) = evaluator {
                evaluator.stop().await;
            }
            summary
        };

        match tokio::time::timeout(deadline, sequence).await {
            Ok(summary) => {
                info!("analytics engine stopped");
                ShutdownReport {
                    complete: true,
                    pool: summary,
                }
            }
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "shutdown deadline elapsed");
                ShutdownReport {
                    complete: false,
                    pool: None,
                }
            }
        }
    }
}
