//! Indexed in-memory metric store with windowed aggregation.

use crate::error::{BatchError, StoreError};
use crate::event_store::time_range;
use crate::filter::MetricFilter;
use crate::{Result, TimeKey};
use chrono::{DateTime, Utc};
use monitor::{counters, Monitor};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;
use types::{AggregatedMetric, AttrMap, Metric, MetricKind};

#[derive(Default)]
struct MetricStoreInner {
    metrics: HashMap<String, Metric>,
    by_name: HashMap<String, BTreeSet<TimeKey>>,
    by_kind: HashMap<MetricKind, BTreeSet<TimeKey>>,
    by_source: HashMap<String, BTreeSet<TimeKey>>,
    by_time: BTreeSet<TimeKey>,
}

impl MetricStoreInner {
    fn insert(&mut self, metric: Metric) {
        let key = (metric.timestamp, metric.id.clone());
        self.by_name
            .entry(metric.name.clone())
            .or_default()
            .insert(key.clone());
        self.by_kind.entry(metric.kind).or_default().insert(key.clone());
        if let Some(source) = &metric.source {
            self.by_source.entry(source.clone()).or_default().insert(key.clone());
        }
        self.by_time.insert(key);
        self.metrics.insert(metric.id.clone(), metric);
    }

    fn remove(&mut self, id: &str) -> Option<Metric> {
        let metric = self.metrics.remove(id)?;
        let key = (metric.timestamp, metric.id.clone());
        if let Some(set) = self.by_name.get_mut(&metric.name) {
            set.remove(&key);
            if set.is_empty() {
                self.by_name.remove(&metric.name);
            }
        }
        if let Some(set) = self.by_kind.get_mut(&metric.kind) {
            set.remove(&key);
            if set.is_empty() {
                self.by_kind.remove(&metric.kind);
            }
        }
        if let Some(source) = &metric.source {
            if let Some(set) = self.by_source.get_mut(source) {
                set.remove(&key);
                if set.is_empty() {
                    self.by_source.remove(source);
                }
            }
        }
        self.by_time.remove(&key);
        Some(metric)
    }
}

/// In-memory keyed metric store. Mirrors [`crate::EventStore`] with
/// name/kind/source indices and on-demand aggregation.
pub struct MetricStore {
    inner: RwLock<MetricStoreInner>,
    max_size: usize,
    monitor: Arc<Monitor>,
}

impl MetricStore {
    pub fn new(max_size: usize, monitor: Arc<Monitor>) -> Self {
        Self {
            inner: RwLock::new(MetricStoreInner::default()),
            max_size: max_size.max(1),
            monitor,
        }
    }

    /// Insert a validated metric. NaN and infinite values are rejected
    /// here, before any state changes.
    pub fn store(&self, metric: Metric) -> Result<()> {
        metric.validate().map_err(StoreError::InvalidMetric)?;

        let mut inner = self.inner.write();
        if inner.metrics.contains_key(&metric.id) {
            return Err(StoreError::DuplicateId(metric.id));
        }
        while inner.metrics.len() >= self.max_size {
            self.evict_oldest(&mut inner);
        }
        inner.insert(metric);
        Ok(())
    }

    pub fn store_batch(&self, metrics: Vec<Metric>) -> std::result::Result<usize, BatchError> {
        let total = metrics.len();
        for (index, metric) in metrics.into_iter().enumerate() {
            let id = metric.id.clone();
            if let Err(source) = self.store(metric) {
                return Err(BatchError { index, id, source });
            }
        }
        Ok(total)
    }

    pub fn get(&self, id: &str) -> Result<Metric> {
        self.inner
            .read()
            .metrics
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Evaluate a filter, ascending `(timestamp, id)` order.
    pub fn query(&self, filter: &MetricFilter) -> Vec<Metric> {
        let inner = self.inner.read();

        let index: &BTreeSet<TimeKey> = if let Some(name) = &filter.name {
            match inner.by_name.get(name) {
                Some(set) => set,
                None => return Vec::new(),
            }
        } else if let Some(source) = &filter.source {
            match inner.by_source.get(source) {
                Some(set) => set,
                None => return Vec::new(),
            }
        } else if let Some(kind) = filter.kind {
            match inner.by_kind.get(&kind) {
                Some(set) => set,
                None => return Vec::new(),
            }
        } else {
            &inner.by_time
        };

        let mut skipped = 0;
        let mut out = Vec::new();
        for (_, id) in time_range(index, filter.from, filter.to) {
            let Some(metric) = inner.metrics.get(id) else {
                continue;
            };
            if !filter.matches(metric) {
                continue;
            }
            if skipped < filter.offset {
                skipped += 1;
                continue;
            }
            out.push(metric.clone());
            if let Some(limit) = filter.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// Point-in-time aggregate over metrics with the given name inside the
    /// window, optionally restricted to metrics whose dimension map
    /// contains every given key/value pair. The scan holds the read lock,
    /// so the resulting (count, sum, min, max) tuple is never torn.
    pub fn aggregate(
        &self,
        name: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        dimensions: Option<&AttrMap>,
    ) -> AggregatedMetric {
        let inner = self.inner.read();

        let window_start = from.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let window_end = to.unwrap_or_else(Utc::now);
        let mut aggregate = AggregatedMetric::new(
            name,
            MetricKind::Counter,
            window_start,
            window_end,
            dimensions.cloned(),
        );

        let Some(index) = inner.by_name.get(name) else {
            return aggregate;
        };

        for (_, id) in time_range(index, from, to) {
            let Some(metric) = inner.metrics.get(id) else {
                continue;
            };
            if let Some(wanted) = dimensions {
                if !dimensions_match(metric, wanted) {
                    continue;
                }
            }
            if aggregate.is_empty() {
                aggregate.kind = metric.kind;
            }
            aggregate.add_value(metric.value);
        }
        aggregate
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.write().remove(id).is_some()
    }

    pub fn clear(&self) {
        *self.inner.write() = MetricStoreInner::default();
    }

    pub fn len(&self) -> usize {
        self.inner.read().metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest(&self, inner: &mut MetricStoreInner) {
        let Some((_, oldest_id)) = inner.by_time.iter().next().cloned() else {
            return;
        };
        if let Some(evicted) = inner.remove(&oldest_id) {
            debug!(id = %evicted.id, name = %evicted.name, "evicted oldest metric");
            self.monitor.inc(counters::STORE_EVICTED);
        }
    }
}

/// Every wanted key/value pair must be present in the metric's dimensions.
fn dimensions_match(metric: &Metric, wanted: &AttrMap) -> bool {
    let Some(dimensions) = &metric.dimensions else {
        return wanted.is_empty();
    };
    wanted.iter().all(|(key, value)| dimensions.get(key) == Some(value))
}
