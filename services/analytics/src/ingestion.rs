//! Event admission: validate, store, hand off to the pool.

use crate::error::IngestError;
use crate::processing::{AnalyticsPool, TaskPayload};
use crate::rules::{processing_task, RuleSet};
use monitor::{counters, Monitor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::EventStore;
use tracing::{debug, warn};
use types::Event;

/// Validates events, writes them to the event store, and submits one
/// processing task per admission.
pub struct IngestionService {
    store: Arc<EventStore>,
    pool: Arc<AnalyticsPool>,
    monitor: Arc<Monitor>,
    rules: Arc<RuleSet>,
    running: AtomicBool,
}

impl IngestionService {
    pub fn new(
        store: Arc<EventStore>,
        pool: Arc<AnalyticsPool>,
        monitor: Arc<Monitor>,
        rules: Arc<RuleSet>,
    ) -> Self {
        Self {
            store,
            pool,
            monitor,
            rules,
            running: AtomicBool::new(false),
        }
    }

    /// First caller wins; repeated starts are no-ops returning `false`.
    pub fn start(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Admit a single event: validate, store, submit the processing task,
    /// bump the ingestion counters.
    pub fn ingest_event(&self, event: Event) -> Result<(), IngestError> {
        if !self.is_running() {
            return Err(IngestError::ServiceNotRunning);
        }
        event.validate().map_err(IngestError::InvalidEvent)?;

        let event_type = event.event_type.clone();
        self.store
            .store(event.clone())
            .map_err(IngestError::from_store)?;

        self.pool
            .submit(processing_task(
                Arc::clone(&self.rules),
                TaskPayload::Event(event),
            ))
            .map_err(|err| {
                warn!(error = %err, "processing task submission failed after store");
                IngestError::Submit(err)
            })?;

        self.monitor.inc(counters::EVENTS_INGESTED_TOTAL);
        self.monitor
            .inc(&format!("{}{}", counters::EVENTS_INGESTED_PREFIX, event_type));
        Ok(())
    }

    /// Admit a batch element-wise through the store. On failure the stored
    /// prefix stays visible, is still submitted for processing, and the
    /// error names the offending element.
    pub fn ingest_batch(&self, events: Vec<Event>) -> Result<usize, IngestError> {
        if !self.is_running() {
            return Err(IngestError::ServiceNotRunning);
        }

        match self.store.store_batch(events.clone()) {
            Ok(total) => {
                self.submit_batch(events);
                Ok(total)
            }
            Err(batch_err) => {
                let stored = events[..batch_err.index].to_vec();
                debug!(
                    stored = stored.len(),
                    failed_index = batch_err.index,
                    "batch partially admitted"
                );
                self.submit_batch(stored);
                Err(IngestError::Batch(batch_err))
            }
        }
    }

    fn submit_batch(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            self.monitor.inc(counters::EVENTS_INGESTED_TOTAL);
            self.monitor
                .inc(&format!("{}{}", counters::EVENTS_INGESTED_PREFIX, event.event_type));
        }
        if let Err(err) = self.pool.submit(processing_task(
            Arc::clone(&self.rules),
            TaskPayload::Batch(events),
        )) {
            warn!(error = %err, "batch processing task submission failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use worker_pool::{PoolConfig, WorkerPool};

    fn event(id: &str) -> Event {
        Event::new(id, "click", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    fn service() -> IngestionService {
        let monitor = Arc::new(Monitor::new(HashMap::new()));
        let store = Arc::new(EventStore::new(100, monitor.clone()));
        let pool: Arc<AnalyticsPool> = Arc::new(WorkerPool::new(PoolConfig::new(2)));
        pool.start();
        IngestionService::new(store, pool, monitor, default_rules())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_not_running_rejected() {
        let service = service();
        assert_eq!(
            service.ingest_event(event("e1")).unwrap_err(),
            IngestError::ServiceNotRunning
        );

        assert!(service.start());
        assert!(!service.start());
        assert!(service.ingest_event(event("e1")).is_ok());

        service.stop();
        assert_eq!(
            service.ingest_event(event("e2")).unwrap_err(),
            IngestError::ServiceNotRunning
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ingest_then_get() {
        let service = service();
        service.start();

        let e = event("e1").with_user("u1");
        service.ingest_event(e.clone()).unwrap();
        assert_eq!(service.store.get("e1").unwrap(), e);
        assert_eq!(service.monitor.get(counters::EVENTS_INGESTED_TOTAL), 1);
        assert_eq!(service.monitor.get("events_ingested_click"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_rejected() {
        let service = service();
        service.start();
        service.ingest_event(event("e1")).unwrap();
        assert_eq!(
            service.ingest_event(event("e1")).unwrap_err(),
            IngestError::DuplicateId("e1".to_string())
        );
        // counter reflects only the successful admission
        assert_eq!(service.monitor.get(counters::EVENTS_INGESTED_TOTAL), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_prefix_semantics() {
        let service = service();
        service.start();

        let batch = vec![event("e1"), event("e2"), event(""), event("e4")];
        let err = service.ingest_batch(batch).unwrap_err();
        match err {
            IngestError::Batch(batch_err) => assert_eq!(batch_err.index, 2),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(service.store.get("e1").is_ok());
        assert!(service.store.get("e2").is_ok());
        assert!(service.store.get("e4").is_err());
        assert_eq!(service.monitor.get(counters::EVENTS_INGESTED_TOTAL), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_batch_admitted() {
        let service = service();
        service.start();
        let admitted = service.ingest_batch(vec![event("e1"), event("e2")]).unwrap();
        assert_eq!(admitted, 2);
        assert_eq!(service.monitor.get(counters::EVENTS_INGESTED_TOTAL), 2);
    }
}
