//! Metrics emission
//!
//! - [`MetricsSink`] - injected destination (in-memory, OpenTelemetry, no-op)
//! - [`PoolMetrics`] - per-pool handle adding the `worker_type` label
//! - [`MetricsEmitter`] - turns periodic runtime samples into gauges/counters
//! - [`RuntimeProbe`] - source of process-wide counters

mod emitter;
pub mod names;
mod otel;
mod runtime;
mod sink;

pub use emitter::{MetricsEmitter, PoolMetrics, PoolSnapshot};
pub use otel::OtelSink;
#[cfg(feature = "dhat-heap")]
pub use runtime::HeapProfiler;
pub use runtime::{AllocationStats, ProcessProbe, RuntimeProbe, RuntimeSample};
pub use sink::{InMemorySink, Labels, MetricsSink, NoopSink};
