//! Kernvm VM Core Runtime
//!
//! This module provides the virtual machine runtime including:
//! - Kernel execution loop with call frames
//! - Error unwinding across live frames
//! - Suspension and resumption of execution contexts
//! - Work queues (manual and thread pool)

pub mod defaults;
pub mod interpreter;
pub mod register_span;
pub mod scheduler;
pub mod value;

pub use interpreter::{ExecutionContext, KernelFrame, LoadedExecutable, Resumer, State};
pub use register_span::{RegisterSpan, RegisterSpanMut};
pub use scheduler::WorkQueue;
pub use value::{HandleError, Value};

/// VM execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// Kernel name not present in the registry
    #[error("Unknown kernel: {0}")]
    UnknownKernel(String),

    /// Function id or name not present in the executable
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Function with no kernels
    #[error("Function '{0}' has no kernels")]
    EmptyFunction(String),

    /// Opcode outside the kernel-name table
    #[error("Invalid opcode {code} in function '{function}' at pc {pc}")]
    InvalidOpcode {
        /// Function containing the kernel
        function: String,
        /// Kernel position
        pc: usize,
        /// The invalid opcode
        code: u32,
    },

    /// Register index outside the function's register file
    #[error("Register r{index} out of range in function '{function}' (num_regs={num_regs})")]
    InvalidRegister {
        /// Function containing the reference
        function: String,
        /// The invalid register index
        index: u32,
        /// Register file size
        num_regs: u32,
    },

    /// Argument or return value count mismatch
    #[error("Arity mismatch in '{function}': expected {expected} values, got {actual}")]
    ArityMismatch {
        /// Function being called or returning
        function: String,
        /// Number of values expected
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Execution was cancelled
    #[error("Execution cancelled")]
    Cancelled,

    /// Failure reported by a kernel body
    #[error("Kernel error: {0}")]
    Kernel(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl VmError {
    /// Create a kernel-reported error
    pub fn kernel(message: impl Into<String>) -> Self {
        VmError::Kernel(message.into())
    }
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
