//! Indexed in-memory event store.

use crate::error::{BatchError, StoreError};
use crate::filter::EventFilter;
use crate::{Result, TimeKey};
use chrono::{DateTime, Duration, Utc};
use monitor::{counters, Monitor};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;
use types::{Event, EventType};

#[derive(Default)]
struct EventStoreInner {
    events: HashMap<String, Event>,
    by_type: HashMap<EventType, BTreeSet<TimeKey>>,
    by_user: HashMap<String, BTreeSet<TimeKey>>,
    by_source: HashMap<String, BTreeSet<TimeKey>>,
    by_time: BTreeSet<TimeKey>,
}

impl EventStoreInner {
    fn insert(&mut self, event: Event) {
        let key = (event.timestamp, event.id.clone());
        self.by_type
            .entry(event.event_type.clone())
            .or_default()
            .insert(key.clone());
        if let Some(user_id) = &event.user_id {
            self.by_user.entry(user_id.clone()).or_default().insert(key.clone());
        }
        if let Some(source) = &event.source {
            self.by_source.entry(source.clone()).or_default().insert(key.clone());
        }
        self.by_time.insert(key);
        self.events.insert(event.id.clone(), event);
    }

    fn remove(&mut self, id: &str) -> Option<Event> {
        let event = self.events.remove(id)?;
        let key = (event.timestamp, event.id.clone());
        if let Some(set) = self.by_type.get_mut(&event.event_type) {
            set.remove(&key);
            if set.is_empty() {
                self.by_type.remove(&event.event_type);
            }
        }
        if let Some(user_id) = &event.user_id {
            if let Some(set) = self.by_user.get_mut(user_id) {
                set.remove(&key);
                if set.is_empty() {
                    self.by_user.remove(user_id);
                }
            }
        }
        if let Some(source) = &event.source {
            if let Some(set) = self.by_source.get_mut(source) {
                set.remove(&key);
                if set.is_empty() {
                    self.by_source.remove(source);
                }
            }
        }
        self.by_time.remove(&key);
        Some(event)
    }
}

/// In-memory keyed event store with secondary indices and time-range scan.
pub struct EventStore {
    inner: RwLock<EventStoreInner>,
    max_size: usize,
    monitor: Arc<Monitor>,
}

impl EventStore {
    pub fn new(max_size: usize, monitor: Arc<Monitor>) -> Self {
        Self {
            inner: RwLock::new(EventStoreInner::default()),
            max_size: max_size.max(1),
            monitor,
        }
    }

    /// Insert a validated event. Duplicate identifiers are an error, never
    /// an overwrite. At capacity the oldest event by timestamp is evicted
    /// first.
    pub fn store(&self, event: Event) -> Result<()> {
        event.validate().map_err(StoreError::InvalidEvent)?;

        let mut inner = self.inner.write();
        if inner.events.contains_key(&event.id) {
            return Err(StoreError::DuplicateId(event.id));
        }
        while inner.events.len() >= self.max_size {
            self.evict_oldest(&mut inner);
        }
        inner.insert(event);
        Ok(())
    }

    /// Insert a batch element-wise. On the first failure the already
    /// inserted prefix stays visible and the error names the offending
    /// element.
    pub fn store_batch(&self, events: Vec<Event>) -> std::result::Result<usize, BatchError> {
        let total = events.len();
        for (index, event) in events.into_iter().enumerate() {
            let id = event.id.clone();
            if let Err(source) = self.store(event) {
                return Err(BatchError { index, id, source });
            }
        }
        Ok(total)
    }

    pub fn get(&self, id: &str) -> Result<Event> {
        self.inner
            .read()
            .events
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Evaluate a filter against the store.
    ///
    /// The narrowest applicable index is scanned over the requested time
    /// range, the remaining predicates are applied linearly, and results
    /// come back in ascending `(timestamp, id)` order.
    pub fn query(&self, filter: &EventFilter) -> Vec<Event> {
        let inner = self.inner.read();

        let merged: BTreeSet<TimeKey>;
        let index: &BTreeSet<TimeKey> = if let Some(user_id) = &filter.user_id {
            match inner.by_user.get(user_id) {
                Some(set) => set,
                None => return Vec::new(),
            }
        } else if let Some(source) = &filter.source {
            match inner.by_source.get(source) {
                Some(set) => set,
                None => return Vec::new(),
            }
        } else if filter.types.len() == 1 {
            match inner.by_type.get(&filter.types[0]) {
                Some(set) => set,
                None => return Vec::new(),
            }
        } else if !filter.types.is_empty() {
            merged = filter
                .types
                .iter()
                .filter_map(|event_type| inner.by_type.get(event_type))
                .flat_map(|set| time_range(set, filter.from, filter.to).cloned())
                .collect();
            &merged
        } else {
            &inner.by_time
        };

        let mut skipped = 0;
        let mut out = Vec::new();
        for (_, id) in time_range(index, filter.from, filter.to) {
            let Some(event) = inner.events.get(id) else {
                continue;
            };
            if !filter.matches(event) {
                continue;
            }
            if skipped < filter.offset {
                skipped += 1;
                continue;
            }
            out.push(event.clone());
            if let Some(limit) = filter.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// Remove an event; returns whether anything was removed.
    pub fn delete(&self, id: &str) -> bool {
        self.inner.write().remove(id).is_some()
    }

    /// Drop all events and rebuild empty indices.
    pub fn clear(&self) {
        *self.inner.write() = EventStoreInner::default();
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest(&self, inner: &mut EventStoreInner) {
        let Some((_, oldest_id)) = inner.by_time.iter().next().cloned() else {
            return;
        };
        if let Some(evicted) = inner.remove(&oldest_id) {
            debug!(id = %evicted.id, timestamp = %evicted.timestamp, "evicted oldest event");
            self.monitor.inc(counters::STORE_EVICTED);
        }
    }
}

/// Range over a time-ordered index, inclusive on both ends of the window.
pub(crate) fn time_range<'a>(
    set: &'a BTreeSet<TimeKey>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &'a TimeKey> {
    let lower = match from {
        Some(from) => Bound::Included((from, String::new())),
        None => Bound::Unbounded,
    };
    // ids sort after the empty string, so excluding (to + 1ns, "") keeps
    // every key with timestamp == to
    let upper = match to.and_then(|to| to.checked_add_signed(Duration::nanoseconds(1))) {
        Some(next) => Bound::Excluded((next, String::new())),
        None => Bound::Unbounded,
    };
    set.range((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, secs).unwrap()
    }

    fn store() -> EventStore {
        EventStore::new(100, Arc::new(Monitor::new(HashMap::new())))
    }

    #[test]
    fn test_store_then_get() {
        let store = store();
        let event = Event::new("e1", "page_view", ts(0)).with_user("u1");
        store.store(event.clone()).unwrap();
        assert_eq!(store.get("e1").unwrap(), event);
        assert!(matches!(store.get("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = store();
        store.store(Event::new("e1", "click", ts(0))).unwrap();
        let err = store.store(Event::new("e1", "click", ts(1))).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "e1"));
        // original is untouched
        assert_eq!(store.get("e1").unwrap().timestamp, ts(0));
    }

    #[test]
    fn test_invalid_event_rejected() {
        let store = store();
        let err = store.store(Event::new("", "click", ts(0))).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEvent(_)));
    }

    #[test]
    fn test_batch_failure_keeps_prefix() {
        let store = store();
        let batch = vec![
            Event::new("e1", "click", ts(0)),
            Event::new("e2", "click", ts(1)),
            Event::new("", "click", ts(2)),
            Event::new("e4", "click", ts(3)),
        ];
        let err = store.store_batch(batch).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(store.get("e1").is_ok());
        assert!(store.get("e2").is_ok());
        assert!(store.get("e4").is_err());
    }

    #[test]
    fn test_query_orders_by_time_then_id() {
        let store = store();
        // inserted out of order, two share a timestamp
        store.store(Event::new("b", "click", ts(1))).unwrap();
        store.store(Event::new("a", "click", ts(1))).unwrap();
        store.store(Event::new("c", "click", ts(0))).unwrap();

        let ids: Vec<String> = store
            .query(&EventFilter::default())
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_query_time_window_and_limit() {
        let store = store();
        for (i, id) in ["e1", "e2", "e3"].iter().enumerate() {
            store.store(Event::new(*id, "click", ts(i as u32))).unwrap();
        }

        let filter = EventFilter::default()
            .with_type("click")
            .between(ts(0), ts(1))
            .with_limit(10);
        let ids: Vec<String> = store.query(&filter).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn test_query_by_user_and_attribute() {
        let store = store();
        let mut data = types::AttrMap::new();
        data.insert("page".to_string(), json!("/home"));
        store
            .store(Event::new("e1", "page_view", ts(0)).with_user("u1").with_data(data))
            .unwrap();
        store.store(Event::new("e2", "page_view", ts(1)).with_user("u2")).unwrap();

        let by_user = store.query(&EventFilter::default().by_user("u1"));
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].id, "e1");

        let by_attr = store.query(&EventFilter::default().with_attribute("page", json!("/home")));
        assert_eq!(by_attr.len(), 1);
        assert_eq!(by_attr[0].id, "e1");
    }

    #[test]
    fn test_query_multiple_types_merges_sorted() {
        let store = store();
        store.store(Event::new("e1", "click", ts(2))).unwrap();
        store.store(Event::new("e2", "purchase", ts(0))).unwrap();
        store.store(Event::new("e3", "signup", ts(1))).unwrap();

        let filter = EventFilter::default().with_type("click").with_type("purchase");
        let ids: Vec<String> = store.query(&filter).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e2", "e1"]);
    }

    #[test]
    fn test_query_offset() {
        let store = store();
        for i in 0..5u32 {
            store.store(Event::new(format!("e{i}"), "click", ts(i))).unwrap();
        }
        let filter = EventFilter::default().with_offset(2).with_limit(2);
        let ids: Vec<String> = store.query(&filter).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e2", "e3"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let monitor = Arc::new(Monitor::new(HashMap::new()));
        let store = EventStore::new(2, monitor.clone());
        store.store(Event::new("e1", "click", ts(0)).with_user("u1")).unwrap();
        store.store(Event::new("e2", "click", ts(1))).unwrap();
        store.store(Event::new("e3", "click", ts(2))).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get("e1").is_err());
        assert!(store.get("e2").is_ok());
        assert!(store.get("e3").is_ok());
        assert_eq!(monitor.get(counters::STORE_EVICTED), 1);
        // the evicted event left no index residue
        assert!(store.query(&EventFilter::default().by_user("u1")).is_empty());
    }

    #[test]
    fn test_delete_and_clear() {
        let store = store();
        store.store(Event::new("e1", "click", ts(0))).unwrap();
        assert!(store.delete("e1"));
        assert!(!store.delete("e1"));

        store.store(Event::new("e2", "click", ts(1))).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.query(&EventFilter::default()).is_empty());
    }
}
