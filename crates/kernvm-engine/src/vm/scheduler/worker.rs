//! Worker thread that executes pool tasks
//!
//! Workers pop from their local deque, refill it from the global injector,
//! or steal from other workers.

use super::pool::PoolShared;
use super::queue::Task;
use crate::vm::{VmError, VmResult};
use crossbeam_deque::{Injector, Steal, Stealer, Worker as CWorker};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

/// Worker thread handle
pub(super) struct Worker {
    id: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread
    pub(super) fn start(
        id: usize,
        name: String,
        local: CWorker<Task>,
        stealers: Vec<Stealer<Task>>,
        shared: Arc<PoolShared>,
    ) -> VmResult<Self> {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || Worker::run_loop(id, local, stealers, shared))
            .map_err(|e| VmError::RuntimeError(format!("failed to spawn worker thread: {}", e)))?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Wait for the worker thread to exit
    ///
    /// A worker cannot join itself; when the last pool handle is dropped
    /// from inside a task, that worker's thread is detached instead.
    pub(super) fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            error!(worker = self.id, "worker thread panicked");
        }
    }

    /// Worker thread main loop
    fn run_loop(
        id: usize,
        local: CWorker<Task>,
        stealers: Vec<Stealer<Task>>,
        shared: Arc<PoolShared>,
    ) {
        debug!(worker = id, "worker started");
        loop {
            match Self::find_work(&local, &stealers, &shared.injector) {
                Some(task) => {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(worker = id, "task panicked");
                    }
                    shared.executed.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    // Pending tasks are drained before a shutdown takes effect.
                    if shared.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    shared.park();
                }
            }
        }
        debug!(worker = id, "worker shutting down");
    }

    /// Find work: local pop, then the injector, then steal
    fn find_work(
        local: &CWorker<Task>,
        stealers: &[Stealer<Task>],
        injector: &Injector<Task>,
    ) -> Option<Task> {
        // 1. Local deque (LIFO - cache locality)
        if let Some(task) = local.pop() {
            return Some(task);
        }

        // 2. Global injector, moving a batch into the local deque
        loop {
            match injector.steal_batch_and_pop(local) {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        // 3. Other workers (FIFO - load balancing)
        Self::steal_from_others(stealers)
    }

    /// Steal from other workers, starting at a random victim
    fn steal_from_others(stealers: &[Stealer<Task>]) -> Option<Task> {
        use rand::Rng;

        if stealers.is_empty() {
            return None;
        }

        let mut rng = rand::thread_rng();
        let start = rng.gen_range(0..stealers.len());

        for i in 0..stealers.len() {
            let stealer = &stealers[(start + i) % stealers.len()];
            loop {
                match stealer.steal() {
                    Steal::Success(task) => return Some(task),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.join();
    }
}
