//! Work queue interface and the manual queue

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A unit of work submitted to a queue
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Thread-safe sink for tasks
pub trait WorkQueue: Send + Sync {
    /// Submit a task for later or concurrent execution
    fn add_task(&self, task: Task);
}

/// FIFO queue drained explicitly by its owner
///
/// Useful when the embedder already has an event loop, and for
/// deterministic single-threaded execution.
#[derive(Default)]
pub struct ManualQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Check if no task is pending
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Run the oldest pending task. Returns false if the queue was empty.
    pub fn run_one(&self) -> bool {
        // Release the lock before running: the task may submit more tasks.
        let task = self.tasks.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks submitted while
    /// draining. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        while self.run_one() {
            count += 1;
        }
        count
    }
}

impl WorkQueue for ManualQueue {
    fn add_task(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl std::fmt::Debug for ManualQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualQueue")
            .field("pending", &self.len())
            .finish()
    }
}
