//! Event -> metric derivation rules.

use crate::processing::{AnalyticsTask, ProcessedEvent, TaskPayload};
use serde_json::Value;
use std::sync::Arc;
use types::{AttrMap, Event, Metric, MetricKind};
use uuid::Uuid;
use worker_pool::Task;

/// One derivation rule. Rules must be pure: they read the event and return
/// metrics, nothing else.
pub trait MetricRule: Send + Sync {
    fn name(&self) -> &str;
    fn derive(&self, event: &Event) -> Vec<Metric>;
}

/// Default rule: every event yields one counter `event.<type>.count` with
/// value 1, carrying the event's source and user as dimensions.
pub struct EventCountRule;

impl MetricRule for EventCountRule {
    fn name(&self) -> &str {
        "event_count"
    }

    fn derive(&self, event: &Event) -> Vec<Metric> {
        let mut dimensions = AttrMap::new();
        if let Some(source) = &event.source {
            dimensions.insert("source".to_string(), Value::String(source.clone()));
        }
        if let Some(user_id) = &event.user_id {
            dimensions.insert("user".to_string(), Value::String(user_id.clone()));
        }

        let mut metric = Metric::new(
            format!("event.{}.count", event.event_type),
            1.0,
            MetricKind::Counter,
            event.timestamp,
        );
        if let Some(source) = &event.source {
            metric = metric.with_source(source.clone());
        }
        if !dimensions.is_empty() {
            metric = metric.with_dimensions(dimensions);
        }
        vec![metric]
    }
}

pub type RuleSet = Vec<Box<dyn MetricRule>>;

pub fn default_rules() -> Arc<RuleSet> {
    Arc::new(vec![Box::new(EventCountRule)])
}

fn apply_rules(rules: &RuleSet, event: &Event) -> Vec<Metric> {
    rules.iter().flat_map(|rule| rule.derive(event)).collect()
}

/// Build the worker-pool task for one ingest (single event or batch). The
/// rules run inside the executor, not on the submitting thread.
pub fn processing_task(rules: Arc<RuleSet>, payload: TaskPayload) -> AnalyticsTask {
    Task::new(Uuid::new_v4().to_string(), payload, move |payload| {
        let events = match payload {
            TaskPayload::Event(event) => vec![event],
            TaskPayload::Batch(events) => events,
        };
        Ok(events
            .into_iter()
            .map(|event| {
                let metrics = apply_rules(&rules, &event);
                ProcessedEvent { event, metrics }
            })
            .collect())
    })
}
