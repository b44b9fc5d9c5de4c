//! Health snapshot and alert record types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Service health status levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Engine running, no alerts at the last evaluation.
    Healthy,
    /// Engine running, but the last evaluation fired alerts.
    Degraded,
    /// Engine not running.
    Unhealthy,
}

/// One threshold breach observed at an evaluation tick.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub counter: String,
    pub value: u64,
    pub threshold: u64,
    pub at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(counter: &str, value: u64, threshold: u64) -> Self {
        Self {
            counter: counter.to_string(),
            value,
            threshold,
            at: Utc::now(),
        }
    }
}

/// Aggregated health view returned by `Monitor::check_health` and served
/// at `/healthz`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub engine_running: bool,
    pub uptime_seconds: u64,
    pub counters: HashMap<String, u64>,
    pub recent_alerts: Vec<AlertRecord>,
}
