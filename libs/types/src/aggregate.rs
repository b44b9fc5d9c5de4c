//! Windowed aggregation over metrics.

use crate::metric::MetricKind;
use crate::AttrMap;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary statistics over a time window, derived on demand from metric
/// store scans. Never persisted.
///
/// `min` / `max` / `avg` are `None` until the first sample lands, which
/// keeps the empty-window case unreadable by construction instead of
/// surfacing fake zeros.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedMetric {
    pub name: String,
    pub kind: MetricKind,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<AttrMap>,

    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

impl AggregatedMetric {
    pub fn new(
        name: impl Into<String>,
        kind: MetricKind,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        dimensions: Option<AttrMap>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            window_start,
            window_end,
            dimensions,
            count: 0,
            sum: 0.0,
            min: None,
            max: None,
            avg: None,
        }
    }

    /// Fold one sample into the aggregate.
    pub fn add_value(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(match self.min {
            Some(min) => min.min(value),
            None => value,
        });
        self.max = Some(match self.max {
            Some(max) => max.max(value),
            None => value,
        });
        self.avg = Some(self.sum / self.count as f64);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_empty_aggregate_has_no_extremes() {
        let (start, end) = window();
        let agg = AggregatedMetric::new("m", MetricKind::Gauge, start, end, None);
        assert!(agg.is_empty());
        assert_eq!(agg.min, None);
        assert_eq!(agg.max, None);
        assert_eq!(agg.avg, None);
        assert_eq!(agg.sum, 0.0);
    }

    #[test]
    fn test_single_sample_seeds_extremes() {
        let (start, end) = window();
        let mut agg = AggregatedMetric::new("m", MetricKind::Gauge, start, end, None);
        agg.add_value(-3.5);
        assert_eq!(agg.count, 1);
        assert_eq!(agg.min, Some(-3.5));
        assert_eq!(agg.max, Some(-3.5));
        assert_eq!(agg.avg, Some(-3.5));
    }

    #[test]
    fn test_aggregate_invariants() {
        let (start, end) = window();
        let mut agg = AggregatedMetric::new("m", MetricKind::Gauge, start, end, None);
        let samples = [4.0, -1.0, 10.5, 0.25, 7.75, 3.0];
        for v in samples {
            agg.add_value(v);
        }

        let min = agg.min.unwrap();
        let max = agg.max.unwrap();
        let avg = agg.avg.unwrap();
        assert_eq!(agg.count as usize, samples.len());
        assert!(min <= avg && avg <= max);

        // sum must equal avg * count up to a relative tolerance of 1e-9
        let reconstructed = avg * agg.count as f64;
        let tolerance = agg.sum.abs().max(1.0) * 1e-9;
        assert!((agg.sum - reconstructed).abs() <= tolerance);
    }
}
