//! Work queues
//!
//! The interpreter never spawns threads. Resumed contexts and unwind
//! continuations are submitted as tasks to a [`WorkQueue`]:
//! - [`ThreadPool`]: work-stealing worker threads
//! - [`ManualQueue`]: tasks run when the owner drains the queue

mod pool;
mod queue;
mod worker;

pub use pool::{PoolConfig, PoolStats, ThreadPool};
pub use queue::{ManualQueue, Task, WorkQueue};
