//! Default constants for VM configuration.

/// Default name prefix for worker threads.
pub const DEFAULT_WORKER_NAME_PREFIX: &str = "kernvm-worker";

/// Default time an idle worker parks before re-checking for stealable work.
pub const DEFAULT_IDLE_WAIT_MS: u64 = 5;
