//! Kernvm Engine
//!
//! This crate provides the kernel interpreter core:
//! - **Bytecode**: functions, kernels, and load-time verification (`bytecode` module)
//! - **VM**: execution loop, error unwinding, resumption, and work queues (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use kernvm_engine::{Executable, ExecutionContext, Function, Kernel, KernelRegistry, LoadedExecutable};
//! use kernvm_engine::vm::scheduler::ManualQueue;
//! use std::sync::Arc;
//!
//! let mut exe = Executable::new();
//! let ret = exe.kernel_code("return");
//! let main = exe.add_function(Function::new("main", 0).kernel(Kernel::new(ret)));
//!
//! let mut registry = KernelRegistry::new();
//! registry.register("return", |frame| frame.return_values(Vec::new()));
//!
//! let loaded = Arc::new(LoadedExecutable::new(exe, &registry)?);
//! let queue = Arc::new(ManualQueue::new());
//! let mut context = ExecutionContext::new(loaded, queue.clone());
//! context.call(main, Vec::new(), 0)?;
//! context.set_exit_handler(|outcome| println!("done: {:?}", outcome.is_ok()));
//! context.run();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Bytecode module: functions, kernels, and verification
pub mod bytecode;

/// VM module: interpreter, unwinding, and scheduling
pub mod vm;

// ============================================================================
// Re-exports
// ============================================================================

pub use bytecode::{Executable, Function, FunctionId, Kernel, RegIndex};
pub use vm::interpreter::{
    execute, ContextControl, ExecutionContext, KernelFn, KernelFrame, KernelRegistry,
    LoadedExecutable, Resumer, State,
};
pub use vm::scheduler::{ManualQueue, PoolConfig, Task, ThreadPool, WorkQueue};
pub use vm::value::{HandleError, Value};
pub use vm::{VmError, VmResult};
