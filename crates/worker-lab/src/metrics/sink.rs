//! Metrics sinks
//!
//! A [`MetricsSink`] is injected into each pool instead of registering
//! collectors globally, so pools stay testable in isolation.

use std::collections::BTreeMap;

use dashmap::DashMap;

/// Label set attached to a measurement
pub type Labels<'a> = &'a [(&'static str, &'a str)];

/// Destination for counters, gauges and histograms
pub trait MetricsSink: Send + Sync {
    /// Add `value` to a monotonic counter
    fn add_counter(&self, name: &'static str, value: u64, labels: Labels<'_>);

    /// Set an instantaneous gauge
    fn set_gauge(&self, name: &'static str, value: f64, labels: Labels<'_>);

    /// Record one histogram observation
    fn record_histogram(&self, name: &'static str, value: f64, labels: Labels<'_>);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn add_counter(&self, _name: &'static str, _value: u64, _labels: Labels<'_>) {}

    fn set_gauge(&self, _name: &'static str, _value: f64, _labels: Labels<'_>) {}

    fn record_histogram(&self, _name: &'static str, _value: f64, _labels: Labels<'_>) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricKey {
    name: &'static str,
    labels: BTreeMap<&'static str, String>,
}

impl MetricKey {
    fn new(name: &'static str, labels: Labels<'_>) -> Self {
        Self {
            name,
            labels: labels.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    fn matches(&self, name: &str, labels: Labels<'_>) -> bool {
        self.name == name
            && labels
                .iter()
                .all(|(k, v)| self.labels.get(k).map(String::as_str) == Some(*v))
    }
}

/// Sink that keeps every measurement in memory
///
/// Queries match on a label *subset*: `counter("x", &[("worker_type", "bad")])`
/// sums every series of `x` carrying that label.
#[derive(Debug, Default)]
pub struct InMemorySink {
    counters: DashMap<MetricKey, u64>,
    gauges: DashMap<MetricKey, f64>,
    histograms: DashMap<MetricKey, Vec<f64>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all counter series matching the labels
    pub fn counter(&self, name: &str, labels: Labels<'_>) -> u64 {
        self.counters
            .iter()
            .filter(|entry| entry.key().matches(name, labels))
            .map(|entry| *entry.value())
            .sum()
    }

    /// Latest value of the first gauge series matching the labels
    pub fn gauge(&self, name: &str, labels: Labels<'_>) -> Option<f64> {
        self.gauges
            .iter()
            .find(|entry| entry.key().matches(name, labels))
            .map(|entry| *entry.value())
    }

    /// Number of observations across histogram series matching the labels
    pub fn histogram_count(&self, name: &str, labels: Labels<'_>) -> usize {
        self.histograms
            .iter()
            .filter(|entry| entry.key().matches(name, labels))
            .map(|entry| entry.value().len())
            .sum()
    }

    /// Names of every metric recorded so far
    pub fn metric_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .counters
            .iter()
            .map(|e| e.key().name)
            .chain(self.gauges.iter().map(|e| e.key().name))
            .chain(self.histograms.iter().map(|e| e.key().name))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl MetricsSink for InMemorySink {
    fn add_counter(&self, name: &'static str, value: u64, labels: Labels<'_>) {
        *self.counters.entry(MetricKey::new(name, labels)).or_insert(0) += value;
    }

    fn set_gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        self.gauges.insert(MetricKey::new(name, labels), value);
    }

    fn record_histogram(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        self.histograms
            .entry(MetricKey::new(name, labels))
            .or_default()
            .push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_accumulates_per_series() {
        let sink = InMemorySink::new();
        sink.add_counter("c", 2, &[("worker_type", "bad"), ("operation", "sum")]);
        sink.add_counter("c", 3, &[("worker_type", "bad"), ("operation", "sum")]);
        sink.add_counter("c", 7, &[("worker_type", "bad"), ("operation", "filter")]);
        sink.add_counter("c", 1, &[("worker_type", "optimized"), ("operation", "sum")]);

        assert_eq!(sink.counter("c", &[("worker_type", "bad"), ("operation", "sum")]), 5);
        assert_eq!(sink.counter("c", &[("worker_type", "bad")]), 12);
        assert_eq!(sink.counter("c", &[]), 13);
        assert_eq!(sink.counter("missing", &[]), 0);
    }

    #[test]
    fn test_gauge_keeps_latest_value() {
        let sink = InMemorySink::new();
        sink.set_gauge("g", 1.0, &[("worker_type", "optimized")]);
        sink.set_gauge("g", 4.0, &[("worker_type", "optimized")]);

        assert_eq!(sink.gauge("g", &[("worker_type", "optimized")]), Some(4.0));
        assert_eq!(sink.gauge("g", &[("worker_type", "bad")]), None);
    }

    #[test]
    fn test_histogram_and_names() {
        let sink = InMemorySink::new();
        sink.record_histogram("h", 0.1, &[]);
        sink.record_histogram("h", 0.2, &[]);
        sink.add_counter("c", 1, &[]);

        assert_eq!(sink.histogram_count("h", &[]), 2);
        assert_eq!(sink.metric_names(), vec!["c", "h"]);
    }

    #[test]
    fn test_noop_sink_accepts_everything() {
        let sink = NoopSink;
        sink.add_counter("c", 1, &[("a", "b")]);
        sink.set_gauge("g", 1.0, &[]);
        sink.record_histogram("h", 1.0, &[]);
    }
}
