//! Kernel registry and loaded executables
//!
//! The registry maps kernel names to kernel bodies. Loading an executable
//! verifies it and resolves its kernel-name table against a registry into a
//! dense dispatch table indexed by opcode.

use super::kernel_frame::KernelFrame;
use crate::bytecode::{verify_executable, Executable, Function, FunctionId};
use crate::vm::{VmError, VmResult};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A kernel body
pub type KernelFn = Arc<dyn Fn(&mut KernelFrame<'_>) + Send + Sync>;

/// Registry of kernel bodies by name
#[derive(Default, Clone)]
pub struct KernelRegistry {
    kernels: FxHashMap<String, KernelFn>,
}

impl KernelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel body, replacing any previous body with that name
    pub fn register<F>(&mut self, name: impl Into<String>, kernel: F)
    where
        F: Fn(&mut KernelFrame<'_>) + Send + Sync + 'static,
    {
        self.kernels.insert(name.into(), Arc::new(kernel));
    }

    /// Look up a kernel body
    pub fn get(&self, name: &str) -> Option<&KernelFn> {
        self.kernels.get(name)
    }

    /// Check if a kernel is registered
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Number of registered kernels
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("KernelRegistry").field("kernels", &names).finish()
    }
}

/// A verified executable with its kernel table resolved
pub struct LoadedExecutable {
    executable: Executable,
    kernels: Vec<KernelFn>,
}

impl LoadedExecutable {
    /// Verify `executable` and resolve its kernels against `registry`
    pub fn new(executable: Executable, registry: &KernelRegistry) -> VmResult<Self> {
        verify_executable(&executable)?;

        let kernels = executable
            .kernel_names
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .cloned()
                    .ok_or_else(|| VmError::UnknownKernel(name.clone()))
            })
            .collect::<VmResult<Vec<_>>>()?;

        Ok(Self {
            executable,
            kernels,
        })
    }

    /// The underlying executable
    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    /// Look up a function by id
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.executable.function(id)
    }

    /// Look up a function id by name
    pub fn function_id(&self, name: &str) -> Option<FunctionId> {
        self.executable.function_id(name)
    }

    /// Function of a live frame. Frames are only created for known ids.
    #[inline]
    pub(crate) fn function_at(&self, id: FunctionId) -> &Function {
        &self.executable.functions[id.index()]
    }

    /// Kernel body for a verified opcode
    #[inline]
    pub(crate) fn kernel_fn(&self, code: u32) -> &KernelFn {
        &self.kernels[code as usize]
    }
}

impl fmt::Debug for LoadedExecutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExecutable")
            .field("kernel_names", &self.executable.kernel_names)
            .field("functions", &self.executable.functions.len())
            .finish()
    }
}
