//! Pool activities
//!
//! Every concurrent activity a pool spawns (workers, per-task helpers, the
//! monitor and the metrics sampler) holds an [`ActivityGuard`] for as long as
//! it runs, so [`ActivityGauge::live`] is the pool's live activity count.
//!
//! Helper, monitor and sampler loops wait on a timer tick or the `until`
//! token, whichever fires first.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::queue::TaskQueue;
use crate::metrics::{MetricsEmitter, PoolSnapshot};
use crate::task::TaskResult;

/// Number of entries refreshed by a helper on every tick
const CHECK_ENTRIES: usize = 10;

/// Counts live activities of one pool
#[derive(Debug, Clone, Default)]
pub struct ActivityGauge {
    live: Arc<AtomicUsize>,
}

impl ActivityGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activities currently running
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Register a new activity; it is counted until the guard drops
    pub(crate) fn enter(&self) -> ActivityGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        ActivityGuard {
            live: Arc::clone(&self.live),
        }
    }

    /// Wait until at most `target` activities are live
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub async fn settle(&self, target: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.live() <= target {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Keeps an activity counted in its [`ActivityGauge`]
#[derive(Debug)]
pub(crate) struct ActivityGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Ticker whose first tick fires one period from now
fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Last bookkeeping pass of a helper
#[derive(Debug, Clone, Copy)]
struct HelperStatus {
    task_id: u64,
    checked_at: Option<DateTime<Utc>>,
}

/// Per-task bookkeeping loop
///
/// Each tick refreshes a fixed-size check buffer and the status record. With
/// `reuse_buffers` the buffer is allocated once; otherwise a fresh one is
/// built every tick.
pub(crate) async fn helper_activity(
    task_id: u64,
    period: Duration,
    reuse_buffers: bool,
    until: CancellationToken,
) {
    let mut ticker = ticker(period);
    let mut status = HelperStatus {
        task_id,
        checked_at: None,
    };
    let mut checks: Vec<usize> = Vec::with_capacity(CHECK_ENTRIES);

    loop {
        tokio::select! {
            biased;
            _ = until.cancelled() => break,
            _ = ticker.tick() => {
                if reuse_buffers {
                    checks.clear();
                } else {
                    checks = Vec::new();
                }
                checks.extend(0..CHECK_ENTRIES);
                status.checked_at = Some(Utc::now());
                trace!(task_id = status.task_id, entries = checks.len(), "Helper check");
            }
        }
    }

    trace!(
        task_id = status.task_id,
        last_check = ?status.checked_at,
        "Helper activity exited"
    );
}

/// Periodic stats report over the result collection
pub(crate) async fn monitor_activity(
    results: Arc<Mutex<Vec<TaskResult>>>,
    period: Duration,
    reuse_buffers: bool,
    until: CancellationToken,
) {
    let mut ticker = ticker(period);
    let mut report = String::with_capacity(64);

    loop {
        tokio::select! {
            biased;
            _ = until.cancelled() => break,
            _ = ticker.tick() => {
                let total = results.lock().len();
                let timestamp = Utc::now().timestamp();

                if reuse_buffers {
                    report.clear();
                    let _ = write!(report, "total={total} timestamp={timestamp}");
                } else {
                    report = format!("total={total} ") + &format!("timestamp={timestamp}");
                }
                trace!(report = %report, "Pool monitor");
            }
        }
    }

    debug!("Monitor activity exited");
}

/// Periodic metrics sampler
pub(crate) async fn sampler_activity(
    mut emitter: MetricsEmitter,
    queue: TaskQueue,
    gauge: ActivityGauge,
    period: Duration,
    until: CancellationToken,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;
            _ = until.cancelled() => break,
            _ = ticker.tick() => {
                emitter.emit(PoolSnapshot {
                    queue_depth: queue.len(),
                    live_activities: gauge.live(),
                });
            }
        }
    }

    debug!("Metrics sampler exited");
}
