//! Process-wide runtime counters
//!
//! [`ProcessProbe`] combines three sources:
//! - the tokio runtime's alive task count
//! - the process resident memory (via `sysinfo`)
//! - heap counters from `dhat`, when built with the `dhat-heap` feature and
//!   the heap profiler is running (they read zero otherwise)

#[cfg(feature = "dhat-heap")]
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System as SysInfo};

/// Set while a [`HeapProfiler`] is alive; `dhat` panics on stats reads otherwise
#[cfg(feature = "dhat-heap")]
static HEAP_PROFILING: AtomicBool = AtomicBool::new(false);

/// Running `dhat` heap profiler
///
/// Requires `dhat::Alloc` as the global allocator:
///
/// ```ignore
/// #[cfg(feature = "dhat-heap")]
/// #[global_allocator]
/// static GLOBAL: dhat::Alloc = dhat::Alloc;
///
/// let _profiler = worker_lab::metrics::HeapProfiler::start();
/// ```
#[cfg(feature = "dhat-heap")]
pub struct HeapProfiler {
    _profiler: dhat::Profiler,
}

#[cfg(feature = "dhat-heap")]
impl HeapProfiler {
    /// Start profiling; `dhat-heap.json` is written when the guard drops
    pub fn start() -> Self {
        let profiler = dhat::Profiler::new_heap();
        HEAP_PROFILING.store(true, Ordering::Release);
        Self {
            _profiler: profiler,
        }
    }
}

#[cfg(feature = "dhat-heap")]
impl Drop for HeapProfiler {
    fn drop(&mut self) {
        HEAP_PROFILING.store(false, Ordering::Release);
    }
}

/// Heap counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Bytes currently allocated
    pub allocated_bytes: u64,
    /// Bytes allocated since profiling started
    pub total_allocated_bytes: u64,
    /// Blocks freed since profiling started
    pub deallocations: u64,
}

impl AllocationStats {
    /// Current heap counters, zero unless a [`HeapProfiler`] is running
    #[cfg(feature = "dhat-heap")]
    pub fn current() -> Self {
        if !HEAP_PROFILING.load(Ordering::Acquire) {
            return Self::default();
        }
        let stats = dhat::HeapStats::get();
        Self {
            allocated_bytes: stats.curr_bytes as u64,
            total_allocated_bytes: stats.total_bytes,
            deallocations: stats.total_blocks.saturating_sub(stats.curr_blocks as u64),
        }
    }

    /// Current heap counters; always zero without the `dhat-heap` feature
    #[cfg(not(feature = "dhat-heap"))]
    pub fn current() -> Self {
        Self::default()
    }
}

/// One reading of the process-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeSample {
    /// Tasks alive on the current tokio runtime
    pub live_tasks: usize,
    pub resident_memory_bytes: u64,
    pub allocations: AllocationStats,
}

/// Source of [`RuntimeSample`]s
pub trait RuntimeProbe: Send + Sync {
    fn sample(&self) -> RuntimeSample;
}

/// Reads counters of the running process
pub struct ProcessProbe {
    pid: Pid,
    system: Mutex<SysInfo>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let system = SysInfo::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new().with_memory()),
        );

        Self {
            pid,
            system: Mutex::new(system),
        }
    }

    fn resident_memory(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );
        system.process(self.pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeProbe for ProcessProbe {
    fn sample(&self) -> RuntimeSample {
        let live_tasks = tokio::runtime::Handle::try_current()
            .map(|handle| handle.metrics().num_alive_tasks())
            .unwrap_or(0);

        RuntimeSample {
            live_tasks,
            resident_memory_bytes: self.resident_memory(),
            allocations: AllocationStats::current(),
        }
    }
}
