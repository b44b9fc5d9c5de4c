//! Query filters for the event and metric stores.

use chrono::{DateTime, Utc};
use serde_json::Value;
use types::{Event, EventType, Metric, MetricKind};

/// Predicate set for [`crate::EventStore::query`].
///
/// All present predicates must hold (conjunction). `limit`/`offset` apply
/// to the filtered, time-ordered result.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub types: Vec<EventType>,
    pub user_id: Option<String>,
    pub source: Option<String>,
    /// Attribute key/value equality against the event's `data` map.
    pub attribute: Option<(String, Value)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl EventFilter {
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_type(mut self, event_type: impl Into<EventType>) -> Self {
        self.types.push(event_type.into());
        self
    }

    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn by_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attribute = Some((key.into(), value));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.timestamp > to {
                return false;
            }
        }
        if !self.types.is_empty() && !self.types.contains(&event.event_type) {
            return false;
        }
        if let Some(user_id) = &self.user_id {
            if event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if event.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        if let Some((key, value)) = &self.attribute {
            match &event.data {
                Some(data) => {
                    if data.get(key) != Some(value) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// Predicate set for [`crate::MetricStore::query`].
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub kind: Option<MetricKind>,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl MetricFilter {
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn by_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn by_kind(mut self, kind: MetricKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn by_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, metric: &Metric) -> bool {
        if let Some(from) = self.from {
            if metric.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if metric.timestamp > to {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if &metric.name != name {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if metric.kind != kind {
                return false;
            }
        }
        if let Some(source) = &self.source {
            if metric.source.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        true
    }
}
