//! Worker pool for task execution
//!
//! Runs tasks on N workers pulling from a shared queue, with per-task helper
//! activities, a monitor and a metrics sampler. The [`LifecycleStrategy`]
//! decides whether `stop()` cancels and joins those auxiliary activities.

use std::fmt::Write as _;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, trace, warn};

use super::activity::{
    helper_activity, monitor_activity, sampler_activity, ActivityGauge, ActivityGuard,
};
use super::config::{ConfigError, WorkerPoolConfig};
use super::queue::TaskQueue;
use super::strategy::LifecycleStrategy;
use crate::metrics::{
    MetricsEmitter, MetricsSink, PoolMetrics, ProcessProbe, RuntimeProbe,
};
use crate::task::{Task, TaskResult};

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerPoolStatus {
    /// Queue and buffers allocated, no workers running
    Created,
    /// Workers are running and accepting tasks
    Running,
    /// Stop requested; workers drain the queue
    Draining,
    /// All joined activities have finished
    Stopped,
}

/// Worker pool errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// `start` called outside `Created`
    #[error("worker pool already started (status: {0:?})")]
    AlreadyStarted(WorkerPoolStatus),

    #[error("no tokio runtime available to spawn workers")]
    NoRuntime,

    /// The queue was closed while tasks were being submitted
    #[error("task queue closed after accepting {accepted} task(s)")]
    QueueClosed { accepted: usize },
}

/// Spawns auxiliary activities according to the pool's strategy
///
/// Cooperative activities run on the tracker and observe `stop`.
/// Fire-and-forget activities are detached and only observe `teardown`,
/// which is cancelled when the pool is dropped.
#[derive(Clone)]
struct Auxiliary {
    strategy: LifecycleStrategy,
    runtime: Handle,
    tracker: TaskTracker,
    stop: CancellationToken,
    teardown: CancellationToken,
    gauge: ActivityGauge,
}

impl Auxiliary {
    fn spawn<F, Fut>(&self, activity: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = self.gauge.enter();
        if self.strategy.joins_auxiliary() {
            let fut = activity(self.stop.clone());
            self.tracker.spawn_on(guarded(guard, fut), &self.runtime);
        } else {
            let fut = activity(self.teardown.clone());
            self.runtime.spawn(guarded(guard, fut));
        }
    }
}

async fn guarded<Fut: Future<Output = ()>>(guard: ActivityGuard, fut: Fut) {
    fut.await;
    drop(guard);
}

/// State shared between the pool handle and its workers
struct Shared {
    config: WorkerPoolConfig,
    queue: TaskQueue,
    results: Arc<Mutex<Vec<TaskResult>>>,
    metrics: PoolMetrics,
}

/// Worker pool running one [`LifecycleStrategy`]
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use worker_lab::metrics::NoopSink;
/// use worker_lab::task::{Operation, Task};
/// use worker_lab::worker::{LifecycleStrategy, WorkerPool, WorkerPoolConfig};
///
/// let config = WorkerPoolConfig::new(LifecycleStrategy::Cooperative);
/// let pool = WorkerPool::new(config, Arc::new(NoopSink))?;
///
/// pool.start(4)?;
/// pool.submit((0..100).map(|id| Task::generate(id, 100, Operation::Sum))).await?;
/// pool.stop().await?;
///
/// assert_eq!(pool.results().len(), 100);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    probe: Arc<dyn RuntimeProbe>,
    status: RwLock<WorkerPoolStatus>,
    gauge: ActivityGauge,
    stop: CancellationToken,
    teardown: CancellationToken,
    workers: TaskTracker,
    auxiliary: Mutex<Option<Auxiliary>>,
    submitters: TaskTracker,
    lifecycle: tokio::sync::Mutex<()>,
}

impl WorkerPool {
    /// Create a pool reporting to `sink`, sampling the running process
    pub fn new(
        config: WorkerPoolConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self, WorkerPoolError> {
        Self::with_probe(config, sink, Arc::new(ProcessProbe::new()))
    }

    /// Create a pool with an explicit runtime probe
    pub fn with_probe(
        config: WorkerPoolConfig,
        sink: Arc<dyn MetricsSink>,
        probe: Arc<dyn RuntimeProbe>,
    ) -> Result<Self, WorkerPoolError> {
        config.validate()?;

        let results = if config.strategy.reuses_buffers() {
            Vec::with_capacity(config.expected_tasks)
        } else {
            Vec::new()
        };

        let shared = Shared {
            queue: TaskQueue::new(config.effective_queue_capacity()),
            results: Arc::new(Mutex::new(results)),
            metrics: PoolMetrics::new(sink, config.strategy.label()),
            config,
        };

        Ok(Self {
            shared: Arc::new(shared),
            probe,
            status: RwLock::new(WorkerPoolStatus::Created),
            gauge: ActivityGauge::new(),
            stop: CancellationToken::new(),
            teardown: CancellationToken::new(),
            workers: TaskTracker::new(),
            auxiliary: Mutex::new(None),
            submitters: TaskTracker::new(),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    /// Spawn `worker_count` workers plus the monitor and metrics sampler
    ///
    /// Only valid in [`WorkerPoolStatus::Created`]. Must be called from
    /// within a tokio runtime.
    #[instrument(skip(self), fields(pool = %self.shared.config.name))]
    pub fn start(&self, worker_count: usize) -> Result<(), WorkerPoolError> {
        let mut status = self.status.write();
        if *status != WorkerPoolStatus::Created {
            return Err(WorkerPoolError::AlreadyStarted(*status));
        }
        if worker_count == 0 {
            return Err(ConfigError::Zero("worker_count").into());
        }
        let runtime = Handle::try_current().map_err(|_| WorkerPoolError::NoRuntime)?;

        let config = &self.shared.config;
        info!(
            pool = %config.name,
            strategy = %config.strategy,
            worker_count,
            queue_capacity = %config.effective_queue_capacity(),
            "Starting worker pool"
        );

        let auxiliary = Auxiliary {
            strategy: config.strategy,
            runtime: runtime.clone(),
            tracker: TaskTracker::new(),
            stop: self.stop.clone(),
            teardown: self.teardown.clone(),
            gauge: self.gauge.clone(),
        };

        for worker_id in 0..worker_count {
            let guard = self.gauge.enter();
            let worker = run_worker(worker_id, Arc::clone(&self.shared), auxiliary.clone());
            self.workers.spawn_on(guarded(guard, worker), &runtime);
        }

        let results = Arc::clone(&self.shared.results);
        let monitor_interval = config.monitor_interval;
        let reuse = config.strategy.reuses_buffers();
        auxiliary.spawn(|until| monitor_activity(results, monitor_interval, reuse, until));

        let emitter = MetricsEmitter::new(self.shared.metrics.clone(), Arc::clone(&self.probe));
        let queue = self.shared.queue.clone();
        let gauge = self.gauge.clone();
        let metrics_interval = config.metrics_interval;
        auxiliary.spawn(|until| sampler_activity(emitter, queue, gauge, metrics_interval, until));

        *self.auxiliary.lock() = Some(auxiliary);
        *status = WorkerPoolStatus::Running;
        Ok(())
    }

    /// Enqueue tasks, waiting while the queue is full
    ///
    /// Returns how many tasks were accepted. A cooperative pool aborts a
    /// pending submit when `stop()` is called and reports the tasks accepted
    /// so far. A fire-and-forget pool surfaces the closed queue as
    /// [`WorkerPoolError::QueueClosed`].
    ///
    /// With `blocking_submit` the wait ignores `stop()`, and `stop()` waits
    /// for the submit: a full queue with no workers never returns.
    #[instrument(skip_all, fields(pool = %self.shared.config.name))]
    pub async fn submit<I>(&self, tasks: I) -> Result<usize, WorkerPoolError>
    where
        I: IntoIterator<Item = Task>,
    {
        let config = &self.shared.config;
        let queue = &self.shared.queue;
        let mut accepted = 0;

        if config.blocking_submit {
            let _pending = self.submitters.token();
            for task in tasks {
                if queue.push(task).await.is_err() {
                    return self.closed_during_submit(accepted);
                }
                accepted += 1;
            }
            return Ok(accepted);
        }

        for task in tasks {
            let pushed = if config.strategy.joins_auxiliary() {
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => {
                        debug!(accepted, "Submit aborted by stop");
                        return Ok(accepted);
                    }
                    pushed = queue.push(task) => pushed,
                }
            } else {
                queue.push(task).await
            };

            if pushed.is_err() {
                return self.closed_during_submit(accepted);
            }
            accepted += 1;
        }

        trace!(accepted, "Tasks submitted");
        Ok(accepted)
    }

    fn closed_during_submit(&self, accepted: usize) -> Result<usize, WorkerPoolError> {
        if self.shared.config.strategy.joins_auxiliary() {
            debug!(accepted, "Queue closed during submit");
            Ok(accepted)
        } else {
            warn!(accepted, "Queue closed during submit");
            Err(WorkerPoolError::QueueClosed { accepted })
        }
    }

    /// Stop the pool
    ///
    /// Signals cancellation, closes the queue and waits for the workers to
    /// drain it. A cooperative pool also waits for every helper, the monitor
    /// and the sampler. Idempotent; concurrent callers serialize.
    #[instrument(skip(self), fields(pool = %self.shared.config.name))]
    pub async fn stop(&self) -> Result<(), WorkerPoolError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.status() == WorkerPoolStatus::Stopped {
            return Ok(());
        }

        info!(pool = %self.shared.config.name, "Stopping worker pool");
        *self.status.write() = WorkerPoolStatus::Draining;
        self.stop.cancel();

        if self.shared.config.blocking_submit {
            self.submitters.close();
            self.submitters.wait().await;
        }

        self.shared.queue.close();
        self.workers.close();
        self.workers.wait().await;
        debug!("All workers exited");

        let auxiliary = self.auxiliary.lock().clone();
        if let Some(auxiliary) = auxiliary {
            if self.shared.config.strategy.joins_auxiliary() {
                auxiliary.tracker.close();
                auxiliary.tracker.wait().await;
                debug!("All auxiliary activities exited");
            } else {
                debug!(leaked = self.gauge.live(), "Auxiliary activities left running");
            }
        }

        *self.status.write() = WorkerPoolStatus::Stopped;
        info!(
            pool = %self.shared.config.name,
            results = self.shared.results.lock().len(),
            live_activities = self.gauge.live(),
            "Worker pool stopped"
        );
        Ok(())
    }

    /// Snapshot of the results collected so far
    pub fn results(&self) -> Vec<TaskResult> {
        self.shared.results.lock().clone()
    }

    pub fn status(&self) -> WorkerPoolStatus {
        *self.status.read()
    }

    /// Tasks waiting in the queue
    pub fn queue_depth(&self) -> usize {
        self.shared.queue.len()
    }

    /// Activities (workers, helpers, monitor, sampler) currently running
    pub fn live_activities(&self) -> usize {
        self.gauge.live()
    }

    /// Gauge handle that stays valid after the pool is dropped
    pub fn activity_gauge(&self) -> ActivityGauge {
        self.gauge.clone()
    }

    pub fn strategy(&self) -> LifecycleStrategy {
        self.shared.config.strategy
    }

    /// Metric label of this pool (`optimized` or `bad`)
    pub fn variant(&self) -> &'static str {
        self.shared.config.strategy.label()
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop.cancel();
        self.teardown.cancel();
        self.shared.queue.close();
    }
}

/// Per-worker trace line describing the last processed task
///
/// Cooperative workers rewrite one buffer in place. Fire-and-forget workers
/// build every line from fresh allocations.
#[derive(Debug, Default)]
struct TaskLog {
    entry: String,
}

impl TaskLog {
    fn record(
        &mut self,
        reuse: bool,
        worker_id: usize,
        result: &TaskResult,
        elapsed: Duration,
    ) -> &str {
        let task_id = result.task_id();
        let info = result.info();
        let elapsed_us = elapsed.as_micros();
        if reuse {
            self.entry.clear();
            // Writing to a String cannot fail
            let _ = write!(
                self.entry,
                "worker={worker_id} task={task_id} info={info} elapsed_us={elapsed_us}"
            );
        } else {
            self.entry = format!("worker={worker_id} ")
                + &format!("task={task_id} ")
                + &format!("info={info} ")
                + &format!("elapsed_us={elapsed_us}");
        }
        &self.entry
    }
}

/// Pull tasks until the queue is closed and drained
///
/// A panic anywhere in the per-task path (processing, result collection,
/// metrics) is counted as a failed task and the worker keeps pulling.
async fn run_worker(worker_id: usize, shared: Arc<Shared>, auxiliary: Auxiliary) {
    let config = &shared.config;
    let reuse = config.strategy.reuses_buffers();
    let mut log = TaskLog::default();
    let mut processed = 0usize;

    while let Some(task) = shared.queue.pop().await {
        let task_id = task.id();
        let operation = task.operation();
        let started = Instant::now();

        let handled = catch_unwind(AssertUnwindSafe(|| {
            let result = task.process();
            let elapsed = started.elapsed();
            let line = log.record(reuse, worker_id, &result, elapsed);
            trace!(line, "Task processed");
            shared.results.lock().push(result);
            shared.metrics.task_processed(operation, elapsed);

            let interval = config.helper_interval;
            auxiliary.spawn(|until| helper_activity(task_id, interval, reuse, until));
        }));

        match handled {
            Ok(()) => processed += 1,
            Err(_) => {
                error!(worker_id, task_id, %operation, "Task panicked during processing");
                // The sink itself may be what panicked
                let _ = catch_unwind(AssertUnwindSafe(|| shared.metrics.task_failed("panic")));
            }
        }
    }

    debug!(worker_id, processed, "Worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{InMemorySink, NoopSink};
    use crate::task::Operation;
    use crate::worker::QueueCapacity;

    fn config(strategy: LifecycleStrategy) -> WorkerPoolConfig {
        WorkerPoolConfig::new(strategy)
            .with_name("test")
            .with_helper_interval(Duration::from_millis(10))
            .with_monitor_interval(Duration::from_millis(10))
            .with_metrics_interval(Duration::from_millis(10))
    }

    fn tasks(count: u64) -> impl Iterator<Item = Task> {
        (0..count).map(|id| Task::generate(id, 16, Operation::from((id % 4) as i64)))
    }

    #[test]
    fn test_worker_pool_status() {
        assert_ne!(WorkerPoolStatus::Running, WorkerPoolStatus::Stopped);
        assert_ne!(WorkerPoolStatus::Draining, WorkerPoolStatus::Created);
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let pool = WorkerPool::new(config(LifecycleStrategy::Cooperative), Arc::new(NoopSink))
            .unwrap();
        assert!(matches!(pool.start(2), Err(WorkerPoolError::NoRuntime)));
        assert_eq!(pool.status(), WorkerPoolStatus::Created);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = config(LifecycleStrategy::Cooperative).with_helper_interval(Duration::ZERO);
        assert!(matches!(
            WorkerPool::new(config, Arc::new(NoopSink)),
            Err(WorkerPoolError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let pool = WorkerPool::new(config(LifecycleStrategy::Cooperative), Arc::new(NoopSink))
            .unwrap();
        assert!(matches!(
            pool.start(0),
            Err(WorkerPoolError::InvalidConfig(_))
        ));

        pool.start(2).unwrap();
        assert_eq!(pool.status(), WorkerPoolStatus::Running);
        assert!(matches!(
            pool.start(2),
            Err(WorkerPoolError::AlreadyStarted(WorkerPoolStatus::Running))
        ));

        pool.stop().await.unwrap();
        assert!(matches!(
            pool.start(2),
            Err(WorkerPoolError::AlreadyStarted(WorkerPoolStatus::Stopped))
        ));
    }

    #[tokio::test]
    async fn test_processes_every_task_once() {
        let pool = WorkerPool::new(config(LifecycleStrategy::Cooperative), Arc::new(NoopSink))
            .unwrap();
        pool.start(3).unwrap();

        assert_eq!(pool.submit(tasks(50)).await.unwrap(), 50);
        pool.stop().await.unwrap();

        let mut ids: Vec<u64> = pool.results().iter().map(|r| r.task_id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
        assert_eq!(pool.status(), WorkerPoolStatus::Stopped);
    }

    #[tokio::test]
    async fn test_cooperative_stop_joins_everything() {
        let pool = WorkerPool::new(config(LifecycleStrategy::Cooperative), Arc::new(NoopSink))
            .unwrap();
        pool.start(2).unwrap();
        pool.submit(tasks(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(pool.live_activities() > 2);

        pool.stop().await.unwrap();
        assert_eq!(pool.live_activities(), 0);
    }

    #[tokio::test]
    async fn test_fire_and_forget_leaks_until_drop() {
        let pool = WorkerPool::new(config(LifecycleStrategy::FireAndForget), Arc::new(NoopSink))
            .unwrap();
        pool.start(2).unwrap();
        pool.submit(tasks(5)).await.unwrap();
        pool.stop().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // monitor, sampler and one helper per task
        assert_eq!(pool.live_activities(), 7);

        let gauge = pool.activity_gauge();
        drop(pool);
        assert!(gauge.settle(0, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let pool = WorkerPool::new(config(LifecycleStrategy::Cooperative), Arc::new(NoopSink))
            .unwrap();
        pool.stop().await.unwrap();
        assert_eq!(pool.status(), WorkerPoolStatus::Stopped);
        assert_eq!(pool.submit(tasks(3)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fire_and_forget_submit_after_stop_reports_closed_queue() {
        let pool = WorkerPool::new(config(LifecycleStrategy::FireAndForget), Arc::new(NoopSink))
            .unwrap();
        pool.start(1).unwrap();
        pool.stop().await.unwrap();

        let err = pool.submit(tasks(3)).await.unwrap_err();
        assert!(matches!(err, WorkerPoolError::QueueClosed { accepted: 0 }));
    }

    #[tokio::test]
    async fn test_records_task_metrics() {
        let sink = Arc::new(InMemorySink::new());
        let pool = WorkerPool::new(config(LifecycleStrategy::Cooperative), sink.clone()).unwrap();
        pool.start(1).unwrap();
        pool.submit(tasks(8)).await.unwrap();
        pool.stop().await.unwrap();

        assert_eq!(
            sink.counter(
                crate::metrics::names::TASKS_PROCESSED,
                &[("worker_type", "optimized")]
            ),
            8
        );
        assert_eq!(
            sink.counter(crate::metrics::names::TASK_ERRORS, &[]),
            0
        );
    }

    #[test]
    fn test_task_log_reuses_buffer_when_cooperative() {
        let result = TaskResult::new(7, crate::task::ResultValue::Integer(3), "Sum");
        let elapsed = Duration::from_micros(42);

        let mut reused = TaskLog::default();
        reused.record(true, 1, &result, elapsed);
        let buffer = reused.entry.as_ptr();
        let capacity = reused.entry.capacity();
        let line = reused.record(true, 1, &result, elapsed).to_string();
        assert_eq!(reused.entry.as_ptr(), buffer);
        assert_eq!(reused.entry.capacity(), capacity);

        let mut fresh = TaskLog::default();
        assert_eq!(fresh.record(false, 1, &result, elapsed), line);
        assert_eq!(line, "worker=1 task=7 info=Sum elapsed_us=42");
    }

    #[tokio::test]
    async fn test_unbuffered_submit_waits_for_a_worker() {
        let config =
            config(LifecycleStrategy::Cooperative).with_queue_capacity(QueueCapacity::Unbuffered);
        let pool = WorkerPool::new(config, Arc::new(NoopSink)).unwrap();

        // Not started: nothing can take the first task
        let pending = tokio::time::timeout(Duration::from_millis(100), pool.submit(tasks(1))).await;
        assert!(pending.is_err());
        assert_eq!(pool.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_unbuffered_queue_hands_off() {
        let config =
            config(LifecycleStrategy::Cooperative).with_queue_capacity(QueueCapacity::Unbuffered);
        let pool = WorkerPool::new(config, Arc::new(NoopSink)).unwrap();
        pool.start(1).unwrap();

        assert_eq!(pool.submit(tasks(20)).await.unwrap(), 20);
        pool.stop().await.unwrap();
        assert_eq!(pool.results().len(), 20);
    }
}
