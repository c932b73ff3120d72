//! Metric names and descriptions

/// Total tasks processed (labels: worker_type, operation)
pub const TASKS_PROCESSED: &str = "worker_tasks_processed_total";
/// Task processing duration in seconds (labels: worker_type, operation)
pub const TASK_DURATION: &str = "worker_task_processing_duration_seconds";
/// Task processing errors (labels: worker_type, error_type)
pub const TASK_ERRORS: &str = "worker_task_errors_total";
/// Tasks waiting in the queue (labels: worker_type)
pub const TASKS_IN_QUEUE: &str = "worker_tasks_in_queue";
/// Tasks alive on the async runtime, process-wide (labels: worker_type)
pub const ACTIVE_TASKS: &str = "worker_active_tasks";
/// Activities spawned by this pool that are still alive (labels: worker_type)
pub const LIVE_ACTIVITIES: &str = "worker_live_activities";
/// Heap bytes currently allocated (labels: worker_type)
pub const ALLOCATED_MEMORY: &str = "worker_allocated_memory_bytes";
/// Resident set size of the process (labels: worker_type)
pub const RESIDENT_MEMORY: &str = "worker_resident_memory_bytes";
/// Cumulative heap bytes allocated (labels: worker_type)
pub const TOTAL_ALLOCATIONS: &str = "worker_total_allocations_bytes";
/// Cumulative deallocations (labels: worker_type)
pub const RECLAIMS: &str = "worker_reclaims_total";

pub const LABEL_WORKER_TYPE: &str = "worker_type";
pub const LABEL_OPERATION: &str = "operation";
pub const LABEL_ERROR_TYPE: &str = "error_type";

/// Help text for a metric name
pub fn description(name: &str) -> &'static str {
    match name {
        TASKS_PROCESSED => "Total number of tasks processed by the worker",
        TASK_DURATION => "Duration of task processing in seconds",
        TASK_ERRORS => "Total number of task processing errors",
        TASKS_IN_QUEUE => "Current number of tasks in the worker queue",
        ACTIVE_TASKS => "Number of tasks alive on the async runtime",
        LIVE_ACTIVITIES => "Number of pool activities still running",
        ALLOCATED_MEMORY => "Current allocated memory in bytes",
        RESIDENT_MEMORY => "Resident memory of the process in bytes",
        TOTAL_ALLOCATIONS => "Total memory allocated in bytes",
        RECLAIMS => "Total number of heap deallocations",
        _ => "",
    }
}
