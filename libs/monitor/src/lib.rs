//! # Pulse Monitor
//!
//! Process-wide observability for the platform: a string-keyed counter
//! registry, threshold-based alert evaluation into a bounded history, a
//! health snapshot, and Prometheus-style text exposition.
//!
//! The monitor is deliberately passive. Components increment counters as a
//! side effect of their work; a periodic evaluator compares counters to the
//! configured thresholds; external observers read everything back through
//! [`Monitor::check_health`] or [`Monitor::render_prometheus`]. Nothing is
//! pushed outward.
//!
//! One `Monitor` instance is shared by reference across the engine, stores,
//! and streams (dependency injection, not a global).

pub mod counters;
mod health;

pub use health::{AlertRecord, HealthSnapshot, HealthStatus};

use parking_lot::Mutex;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Number of alert records retained in the ring buffer.
pub const DEFAULT_ALERT_HISTORY: usize = 64;

/// Counter registry plus alert state.
pub struct Monitor {
    counters: Mutex<HashMap<String, u64>>,
    thresholds: HashMap<String, u64>,
    alerts: Mutex<AllocRingBuffer<AlertRecord>>,
    /// Alerts fired by the most recent evaluation pass.
    last_eval_fired: AtomicUsize,
    engine_running: AtomicBool,
    started_at: Instant,
}

impl Monitor {
    pub fn new(thresholds: HashMap<String, u64>) -> Self {
        Self::with_history(thresholds, DEFAULT_ALERT_HISTORY)
    }

    pub fn with_history(thresholds: HashMap<String, u64>, history: usize) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            thresholds,
            alerts: Mutex::new(AllocRingBuffer::new(history.max(1))),
            last_eval_fired: AtomicUsize::new(0),
            engine_running: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Increment a counter by one, creating it at zero first if absent.
    pub fn inc(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, delta: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Set a counter to an absolute value.
    pub fn set(&self, name: &str, value: u64) {
        self.counters.lock().insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn get_all(&self) -> HashMap<String, u64> {
        self.counters.lock().clone()
    }

    /// Engine lifecycle flag feeding the health snapshot.
    pub fn set_engine_running(&self, running: bool) {
        self.engine_running.store(running, Ordering::SeqCst);
    }

    pub fn engine_running(&self) -> bool {
        self.engine_running.load(Ordering::SeqCst)
    }

    /// Compare every configured threshold against the current counter
    /// value, recording one [`AlertRecord`] per breach. Returns the number
    /// of alerts fired by this pass.
    pub fn evaluate_alerts(&self) -> usize {
        let mut fired = 0;
        for (name, threshold) in &self.thresholds {
            let value = self.get(name);
            if value > *threshold {
                warn!(
                    counter = %name,
                    value,
                    threshold,
                    "counter exceeded alert threshold"
                );
                self.alerts.lock().push(AlertRecord::new(name, value, *threshold));
                fired += 1;
            }
        }
        self.last_eval_fired.store(fired, Ordering::SeqCst);
        fired
    }

    pub fn recent_alerts(&self) -> Vec<AlertRecord> {
        self.alerts.lock().iter().cloned().collect()
    }

    /// Point-in-time health view.
    ///
    /// Unhealthy while the engine is down, degraded when the last
    /// evaluation pass fired alerts, healthy otherwise.
    pub fn check_health(&self) -> HealthSnapshot {
        let engine_running = self.engine_running();
        let status = if !engine_running {
            HealthStatus::Unhealthy
        } else if self.last_eval_fired.load(Ordering::SeqCst) > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthSnapshot {
            status,
            engine_running,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            counters: self.get_all(),
            recent_alerts: self.recent_alerts(),
        }
    }

    /// Prometheus exposition text for every counter, names sanitized to
    /// the metric charset and sorted for stable output.
    pub fn render_prometheus(&self) -> String {
        let counters = self.get_all();
        let mut names: Vec<&String> = counters.keys().collect();
        names.sort();

        let mut out = String::new();
        for name in names {
            let sanitized: String = name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            out.push_str(&format!("# TYPE {sanitized} counter\n"));
            out.push_str(&format!("{sanitized} {}\n", counters[name]));
        }
        out
    }

    /// Spawn the periodic alert evaluation task. Stopped via
    /// [`AlertEvaluator::stop`]; the engine owns that lifecycle.
    pub fn spawn_evaluator(self: &Arc<Self>, interval: Duration) -> AlertEvaluator {
        let (quit_tx, mut quit_rx) = watch::channel(false);
        let monitor = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick of a tokio interval fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = quit_rx.changed() => break,
                    _ = ticker.tick() => {
                        monitor.evaluate_alerts();
                    }
                }
            }
            debug!("alert evaluator stopped");
        });

        AlertEvaluator {
            quit: quit_tx,
            handle,
        }
    }
}

/// Handle to the background alert evaluation task.
pub struct AlertEvaluator {
    quit: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AlertEvaluator {
    pub async fn stop(self) {
        let _ = self.quit.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_monotonic_under_inc() {
        let monitor = Monitor::new(HashMap::new());
        assert_eq!(monitor.get("x"), 0);
        for i in 1..=100u64 {
            let before = monitor.get("x");
            monitor.inc("x");
            let after = monitor.get("x");
            assert!(after >= before);
            assert_eq!(after, i);
        }
    }

    #[test]
    fn test_set_and_get_all() {
        let monitor = Monitor::new(HashMap::new());
        monitor.set("a", 7);
        monitor.inc("b");
        let all = monitor.get_all();
        assert_eq!(all.get("a"), Some(&7));
        assert_eq!(all.get("b"), Some(&1));
    }

    #[test]
    fn test_alert_evaluation() {
        let thresholds = HashMap::from([("stream.dropped".to_string(), 5u64)]);
        let monitor = Monitor::new(thresholds);

        monitor.set("stream.dropped", 5);
        assert_eq!(monitor.evaluate_alerts(), 0);

        monitor.set("stream.dropped", 6);
        assert_eq!(monitor.evaluate_alerts(), 1);

        let alerts = monitor.recent_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].counter, "stream.dropped");
        assert_eq!(alerts[0].value, 6);
        assert_eq!(alerts[0].threshold, 5);
    }

    #[test]
    fn test_alert_history_is_bounded() {
        let thresholds = HashMap::from([("c".to_string(), 0u64)]);
        let monitor = Monitor::with_history(thresholds, 3);
        monitor.set("c", 1);
        for _ in 0..10 {
            monitor.evaluate_alerts();
        }
        assert_eq!(monitor.recent_alerts().len(), 3);
    }

    #[test]
    fn test_health_status_ladder() {
        let thresholds = HashMap::from([("c".to_string(), 0u64)]);
        let monitor = Monitor::new(thresholds);

        assert_eq!(monitor.check_health().status, HealthStatus::Unhealthy);

        monitor.set_engine_running(true);
        assert_eq!(monitor.check_health().status, HealthStatus::Healthy);

        monitor.set("c", 1);
        monitor.evaluate_alerts();
        assert_eq!(monitor.check_health().status, HealthStatus::Degraded);
    }

    #[test]
    fn test_prometheus_rendering() {
        let monitor = Monitor::new(HashMap::new());
        monitor.set("stream.dropped", 2);
        monitor.set("events_ingested_total", 10);

        let text = monitor.render_prometheus();
        assert!(text.contains("# TYPE events_ingested_total counter\nevents_ingested_total 10\n"));
        assert!(text.contains("# TYPE stream_dropped counter\nstream_dropped 2\n"));
    }

    #[tokio::test]
    async fn test_evaluator_ticks_and_stops() {
        let thresholds = HashMap::from([("c".to_string(), 0u64)]);
        let monitor = Arc::new(Monitor::new(thresholds));
        monitor.set("c", 1);

        let evaluator = monitor.spawn_evaluator(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        evaluator.stop().await;

        assert!(!monitor.recent_alerts().is_empty());
    }
}
