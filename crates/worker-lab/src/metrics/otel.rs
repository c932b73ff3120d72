//! OpenTelemetry-backed metrics sink
//!
//! Instruments are created lazily on first use and cached by name. Export is
//! configured by the meter provider (see [`crate::telemetry`]).

use dashmap::DashMap;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;

use super::names;
use super::sink::{Labels, MetricsSink};

/// Duration buckets in seconds
const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Publishes measurements through an OpenTelemetry [`Meter`]
pub struct OtelSink {
    meter: Meter,
    counters: DashMap<&'static str, Counter<u64>>,
    gauges: DashMap<&'static str, Gauge<f64>>,
    histograms: DashMap<&'static str, Histogram<f64>>,
}

impl OtelSink {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            counters: DashMap::new(),
            gauges: DashMap::new(),
            histograms: DashMap::new(),
        }
    }

    /// Sink using the globally installed meter provider
    pub fn global() -> Self {
        Self::new(opentelemetry::global::meter("worker-lab"))
    }

    fn attributes(labels: Labels<'_>) -> Vec<KeyValue> {
        labels
            .iter()
            .map(|(k, v)| KeyValue::new(*k, v.to_string()))
            .collect()
    }
}

impl MetricsSink for OtelSink {
    fn add_counter(&self, name: &'static str, value: u64, labels: Labels<'_>) {
        let counter = self.counters.entry(name).or_insert_with(|| {
            self.meter
                .u64_counter(name)
                .with_description(names::description(name))
                .build()
        });
        counter.add(value, &Self::attributes(labels));
    }

    fn set_gauge(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        let gauge = self.gauges.entry(name).or_insert_with(|| {
            self.meter
                .f64_gauge(name)
                .with_description(names::description(name))
                .build()
        });
        gauge.record(value, &Self::attributes(labels));
    }

    fn record_histogram(&self, name: &'static str, value: f64, labels: Labels<'_>) {
        let histogram = self.histograms.entry(name).or_insert_with(|| {
            self.meter
                .f64_histogram(name)
                .with_unit("s")
                .with_description(names::description(name))
                .with_boundaries(DURATION_BUCKETS.to_vec())
                .build()
        });
        histogram.record(value, &Self::attributes(labels));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::SdkMeterProvider;

    #[test]
    fn test_instruments_are_cached() {
        let provider = SdkMeterProvider::builder().build();
        let sink = OtelSink::new(provider.meter("test"));

        sink.add_counter(names::TASKS_PROCESSED, 1, &[("worker_type", "optimized")]);
        sink.add_counter(names::TASKS_PROCESSED, 2, &[("worker_type", "bad")]);
        sink.set_gauge(names::TASKS_IN_QUEUE, 3.0, &[("worker_type", "bad")]);
        sink.record_histogram(names::TASK_DURATION, 0.02, &[("operation", "sum")]);

        assert_eq!(sink.counters.len(), 1);
        assert_eq!(sink.gauges.len(), 1);
        assert_eq!(sink.histograms.len(), 1);
    }
}
