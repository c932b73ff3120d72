//! Worker pool for task execution
//!
//! This module provides:
//! - [`WorkerPool`] - workers pulling from a shared queue with a
//!   `Created → Running → Draining → Stopped` lifecycle
//! - [`LifecycleStrategy`] - cooperative (`optimized`) or fire-and-forget
//!   (`bad`) handling of auxiliary activities
//! - [`WorkerPoolConfig`] - sizing, intervals and fault injection
//! - [`ActivityGauge`] - live activity count of a pool
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         WorkerPool                            │
//! │   submit() ──▶ ┌──────────────────────────┐                   │
//! │                │   TaskQueue (MPMC)       │                   │
//! │                └────────────┬─────────────┘                   │
//! │                             ▼                                 │
//! │   ┌──────────┐ ┌──────────┐     ┌──────────┐                  │
//! │   │ Worker 1 │ │ Worker 2 │ ... │ Worker N │  (joined always) │
//! │   └────┬─────┘ └────┬─────┘     └────┬─────┘                  │
//! │        │ results    │ helper per task│                        │
//! │        ▼            ▼                ▼                        │
//! │   ┌──────────────────────────────────────────────────────┐    │
//! │   │ Auxiliary: helpers, monitor (100ms), sampler (5s)    │    │
//! │   │  cooperative: tracked, observe stop()                │    │
//! │   │  fire-and-forget: detached, observe pool drop only   │    │
//! │   └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod activity;
mod config;
mod pool;
mod queue;
mod strategy;

pub use activity::ActivityGauge;
pub use config::{ConfigError, WorkerPoolConfig};
pub use pool::{WorkerPool, WorkerPoolError, WorkerPoolStatus};
pub use queue::{QueueCapacity, QueueClosed, TaskQueue};
pub use strategy::{LifecycleStrategy, ParseStrategyError};
