//! # Worker Lifecycle Lab
//!
//! A task-queue-backed worker pool implemented twice over one type: once with
//! cooperative cancellation and once with fire-and-forget auxiliary
//! activities, so the two lifecycles can be compared on the same workload.
//!
//! ## Features
//!
//! - **Pure task model**: sum, multiply, square and filter over integer payloads
//! - **Lifecycle strategies**: `optimized` joins every activity on `stop()`,
//!   `bad` leaks helpers, monitor and sampler until the pool is dropped
//! - **Injected metrics**: per-pool sink (in-memory, OpenTelemetry, no-op)
//! - **Fault injection**: a blocking submit path reproducing the full-queue deadlock
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Producers (submit)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkerPool                              │
//! │  (queue, workers, helpers, monitor, lifecycle strategy)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MetricsEmitter                            │
//! │  (runtime probe → MetricsSink, tagged worker_type)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use worker_lab::prelude::*;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::default(), Arc::new(NoopSink))?;
//! pool.start(4)?;
//! pool.submit(TaskGenerator::new(100).batch(1000)).await?;
//! pool.stop().await?;
//! println!("{} results", pool.results().len());
//! ```

pub mod metrics;
pub mod task;
pub mod telemetry;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::metrics::{InMemorySink, MetricsSink, NoopSink, OtelSink};
    pub use crate::task::{Operation, ResultValue, Task, TaskGenerator, TaskResult};
    pub use crate::worker::{
        LifecycleStrategy, QueueCapacity, WorkerPool, WorkerPoolConfig, WorkerPoolError,
        WorkerPoolStatus,
    };
}

// Re-export key types at crate root
pub use metrics::{InMemorySink, MetricsSink, NoopSink};
pub use task::{Operation, ResultValue, Task, TaskGenerator, TaskResult};
pub use worker::{LifecycleStrategy, WorkerPool, WorkerPoolConfig, WorkerPoolError};
