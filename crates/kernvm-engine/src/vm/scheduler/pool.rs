//! Work-stealing thread pool
//!
//! Tasks enter through a global injector. Each worker keeps a local LIFO
//! deque, refilled in batches from the injector, and steals from its peers
//! when both are empty. Idle workers park on a condition variable.

use super::queue::{Task, WorkQueue};
use super::worker::Worker;
use crate::vm::defaults::{DEFAULT_IDLE_WAIT_MS, DEFAULT_WORKER_NAME_PREFIX};
use crate::vm::VmResult;
use crossbeam_deque::{Injector, Worker as CWorker};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Thread pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub worker_count: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{id}`
    pub thread_name_prefix: String,
    /// How long an idle worker parks before looking for stealable work
    pub idle_wait: Duration,
}

impl PoolConfig {
    /// Default configuration with a fixed worker count
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    fn resolved_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get()
        } else {
            self.worker_count
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            thread_name_prefix: DEFAULT_WORKER_NAME_PREFIX.to_string(),
            idle_wait: Duration::from_millis(DEFAULT_IDLE_WAIT_MS),
        }
    }
}

/// Thread pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total tasks submitted
    pub tasks_submitted: u64,
    /// Total tasks run to completion (including ones that panicked)
    pub tasks_executed: u64,
    /// Number of worker threads
    pub worker_count: usize,
}

/// State shared between the pool handle and its workers
pub(super) struct PoolShared {
    pub(super) injector: Injector<Task>,
    pub(super) shutdown: AtomicBool,
    pub(super) submitted: AtomicU64,
    pub(super) executed: AtomicU64,
    idle_lock: Mutex<()>,
    idle: Condvar,
    idle_wait: Duration,
}

impl PoolShared {
    fn new(idle_wait: Duration) -> Self {
        Self {
            injector: Injector::new(),
            shutdown: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            idle_wait,
        }
    }

    /// Park the calling worker until new work is announced or the idle
    /// wait elapses
    pub(super) fn park(&self) {
        let mut guard = self.idle_lock.lock();
        if self.injector.is_empty() && !self.shutdown.load(Ordering::Acquire) {
            self.idle.wait_for(&mut guard, self.idle_wait);
        }
    }

    fn notify_one(&self) {
        let _guard = self.idle_lock.lock();
        self.idle.notify_one();
    }

    fn notify_all(&self) {
        let _guard = self.idle_lock.lock();
        self.idle.notify_all();
    }
}

/// Work-stealing thread pool
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<Worker>,
}

impl ThreadPool {
    /// Start a pool with the given configuration
    pub fn new(config: PoolConfig) -> VmResult<Self> {
        let worker_count = config.resolved_worker_count();
        let shared = Arc::new(PoolShared::new(config.idle_wait));

        let deques: Vec<CWorker<Task>> = (0..worker_count).map(|_| CWorker::new_lifo()).collect();
        let stealers: Vec<_> = deques.iter().map(|d| d.stealer()).collect();

        // Dropping a partially started pool stops the workers already running.
        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
        };

        for (id, local) in deques.into_iter().enumerate() {
            let other_stealers = stealers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != id)
                .map(|(_, s)| s.clone())
                .collect();

            let worker = Worker::start(
                id,
                format!("{}-{}", config.thread_name_prefix, id),
                local,
                other_stealers,
                pool.shared.clone(),
            )?;
            pool.workers.push(worker);
        }

        debug!(workers = worker_count, "thread pool started");
        Ok(pool)
    }

    /// Start a pool with `worker_count` workers and default settings
    pub fn with_workers(worker_count: usize) -> VmResult<Self> {
        Self::new(PoolConfig::with_workers(worker_count))
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Current statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            tasks_submitted: self.shared.submitted.load(Ordering::Relaxed),
            tasks_executed: self.shared.executed.load(Ordering::Relaxed),
            worker_count: self.workers.len(),
        }
    }

    /// Check if the pool has been shut down
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting tasks, let workers drain the queue, and join them
    pub fn shutdown(&mut self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.notify_all();
        for worker in &mut self.workers {
            worker.join();
        }
        debug!("thread pool stopped");
    }
}

impl WorkQueue for ThreadPool {
    fn add_task(&self, task: Task) {
        if self.shared.shutdown.load(Ordering::Acquire) {
            warn!("task submitted to a stopped thread pool was dropped");
            return;
        }
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.injector.push(task);
        self.shared.notify_one();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("stats", &self.stats())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
