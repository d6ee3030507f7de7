//! Kernvm Bytecode Definitions
//!
//! In-memory model of a compiled program: a table of kernel names, and a
//! list of functions, each an ordered sequence of kernels over a fixed-size
//! register file. Serialization of this model lives outside the engine.

pub mod function;
pub mod verify;

pub use function::{Executable, Function, FunctionId, Kernel, RegIndex};
pub use verify::verify_executable;
