//! Pool-level metric emission
//!
//! [`PoolMetrics`] tags every measurement with the pool's `worker_type`
//! label. [`MetricsEmitter`] turns periodic [`RuntimeSample`]s into gauges and
//! counter deltas.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::names;
use super::runtime::{RuntimeProbe, RuntimeSample};
use super::sink::MetricsSink;
use crate::task::Operation;

/// Metric handle bound to one pool's `worker_type` label
#[derive(Clone)]
pub struct PoolMetrics {
    sink: Arc<dyn MetricsSink>,
    worker_type: &'static str,
}

impl PoolMetrics {
    pub fn new(sink: Arc<dyn MetricsSink>, worker_type: &'static str) -> Self {
        Self { sink, worker_type }
    }

    pub fn worker_type(&self) -> &'static str {
        self.worker_type
    }

    /// Count a processed task and record how long it took
    pub fn task_processed(&self, operation: Operation, duration: Duration) {
        let labels = [
            (names::LABEL_WORKER_TYPE, self.worker_type),
            (names::LABEL_OPERATION, operation.as_str()),
        ];
        self.sink.add_counter(names::TASKS_PROCESSED, 1, &labels);
        self.sink
            .record_histogram(names::TASK_DURATION, duration.as_secs_f64(), &labels);
    }

    /// Count a task that failed to process
    pub fn task_failed(&self, error_type: &str) {
        self.sink.add_counter(
            names::TASK_ERRORS,
            1,
            &[
                (names::LABEL_WORKER_TYPE, self.worker_type),
                (names::LABEL_ERROR_TYPE, error_type),
            ],
        );
    }

    fn gauge(&self, name: &'static str, value: f64) {
        self.sink
            .set_gauge(name, value, &[(names::LABEL_WORKER_TYPE, self.worker_type)]);
    }

    fn counter(&self, name: &'static str, value: u64) {
        if value > 0 {
            self.sink
                .add_counter(name, value, &[(names::LABEL_WORKER_TYPE, self.worker_type)]);
        }
    }
}

/// Pool state read alongside each runtime sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub queue_depth: usize,
    pub live_activities: usize,
}

/// Publishes runtime samples as gauges and monotonic counters
///
/// Cumulative counters (total allocated bytes, deallocations) are published as
/// the delta against the previous sample, so the sink sees a monotonic counter.
pub struct MetricsEmitter {
    metrics: PoolMetrics,
    probe: Arc<dyn RuntimeProbe>,
    last: RuntimeSample,
}

impl MetricsEmitter {
    pub fn new(metrics: PoolMetrics, probe: Arc<dyn RuntimeProbe>) -> Self {
        Self {
            metrics,
            probe,
            last: RuntimeSample::default(),
        }
    }

    /// Take one sample and publish it
    pub fn emit(&mut self, pool: PoolSnapshot) -> RuntimeSample {
        let sample = self.probe.sample();
        let m = &self.metrics;

        m.gauge(names::ACTIVE_TASKS, sample.live_tasks as f64);
        m.gauge(names::LIVE_ACTIVITIES, pool.live_activities as f64);
        m.gauge(names::TASKS_IN_QUEUE, pool.queue_depth as f64);
        m.gauge(
            names::ALLOCATED_MEMORY,
            sample.allocations.allocated_bytes as f64,
        );
        m.gauge(names::RESIDENT_MEMORY, sample.resident_memory_bytes as f64);

        let allocs = sample.allocations;
        let last = self.last.allocations;
        if allocs.total_allocated_bytes > last.total_allocated_bytes {
            m.counter(
                names::TOTAL_ALLOCATIONS,
                allocs.total_allocated_bytes - last.total_allocated_bytes,
            );
        }
        if allocs.deallocations > last.deallocations {
            m.counter(names::RECLAIMS, allocs.deallocations - last.deallocations);
        }

        trace!(
            worker_type = m.worker_type(),
            live_tasks = sample.live_tasks,
            queue_depth = pool.queue_depth,
            live_activities = pool.live_activities,
            "Published runtime sample"
        );

        self.last = sample;
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::runtime::AllocationStats;
    use crate::metrics::sink::InMemorySink;
    use parking_lot::Mutex;

    struct ScriptedProbe {
        samples: Mutex<Vec<RuntimeSample>>,
    }

    impl RuntimeProbe for ScriptedProbe {
        fn sample(&self) -> RuntimeSample {
            self.samples.lock().remove(0)
        }
    }

    fn sample(live_tasks: usize, total: u64, deallocs: u64) -> RuntimeSample {
        RuntimeSample {
            live_tasks,
            resident_memory_bytes: 4096,
            allocations: AllocationStats {
                allocated_bytes: total / 2,
                total_allocated_bytes: total,
                deallocations: deallocs,
            },
        }
    }

    #[test]
    fn test_task_processed_labels() {
        let sink = Arc::new(InMemorySink::new());
        let metrics = PoolMetrics::new(sink.clone(), "optimized");

        metrics.task_processed(Operation::Sum, Duration::from_millis(2));
        metrics.task_processed(Operation::Sum, Duration::from_millis(3));
        metrics.task_processed(Operation::Filter, Duration::from_millis(1));
        metrics.task_failed("panic");

        let labels = [("worker_type", "optimized"), ("operation", "sum")];
        assert_eq!(sink.counter(names::TASKS_PROCESSED, &labels), 2);
        assert_eq!(sink.histogram_count(names::TASK_DURATION, &labels), 2);
        assert_eq!(
            sink.counter(names::TASKS_PROCESSED, &[("worker_type", "optimized")]),
            3
        );
        assert_eq!(
            sink.counter(names::TASK_ERRORS, &[("error_type", "panic")]),
            1
        );
    }

    #[test]
    fn test_emitter_publishes_deltas() {
        let sink = Arc::new(InMemorySink::new());
        let probe = Arc::new(ScriptedProbe {
            samples: Mutex::new(vec![sample(5, 1000, 10), sample(7, 1500, 12)]),
        });
        let mut emitter = MetricsEmitter::new(PoolMetrics::new(sink.clone(), "bad"), probe);
        let labels = [("worker_type", "bad")];

        emitter.emit(PoolSnapshot {
            queue_depth: 3,
            live_activities: 4,
        });
        assert_eq!(sink.counter(names::TOTAL_ALLOCATIONS, &labels), 1000);
        assert_eq!(sink.counter(names::RECLAIMS, &labels), 10);

        emitter.emit(PoolSnapshot {
            queue_depth: 0,
            live_activities: 2,
        });
        assert_eq!(sink.counter(names::TOTAL_ALLOCATIONS, &labels), 1500);
        assert_eq!(sink.counter(names::RECLAIMS, &labels), 12);
        assert_eq!(sink.gauge(names::ACTIVE_TASKS, &labels), Some(7.0));
        assert_eq!(sink.gauge(names::TASKS_IN_QUEUE, &labels), Some(0.0));
        assert_eq!(sink.gauge(names::LIVE_ACTIVITIES, &labels), Some(2.0));
        assert_eq!(sink.gauge(names::ALLOCATED_MEMORY, &labels), Some(750.0));
    }
}
