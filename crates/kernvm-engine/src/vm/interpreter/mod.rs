//! Kernel interpreter
//!
//! - [`ExecutionContext`]: frame stack, state machine, one-shot handlers
//! - [`execute`]: the step loop
//! - [`KernelFrame`]: what a kernel body sees during one step
//! - [`Resumer`]: continuation of a suspended context
//! - [`KernelRegistry`] / [`LoadedExecutable`]: the dispatch table

mod context;
mod execute;
mod kernel_frame;
mod registry;
mod resumer;
mod unwind;

pub use context::{
    ContextControl, ExecutionContext, ExitHandler, FunctionContext, State, SuspendHandler,
};
pub use execute::execute;
pub use kernel_frame::KernelFrame;
pub use registry::{KernelFn, KernelRegistry, LoadedExecutable};
pub use resumer::Resumer;
pub use unwind::UnwindPoint;
