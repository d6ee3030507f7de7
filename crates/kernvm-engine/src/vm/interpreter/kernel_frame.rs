//! Kernel frames
//!
//! A [`KernelFrame`] is built by the execution loop for every step. It
//! exposes the running kernel's operands and the state transitions a kernel
//! may request: call, return, suspend, fail. It also lends the loop's ready
//! slot, so a kernel that wakes another context can hand it to this thread
//! instead of the work queue.

use super::context::{push_frame, ContextControl, ExecutionContext, FunctionContext, State};
use super::registry::LoadedExecutable;
use super::resumer::Resumer;
use crate::bytecode::{Function, FunctionId, Kernel};
use crate::vm::register_span::RegisterSpan;
use crate::vm::value::Value;
use crate::vm::VmError;

/// Per-step handle over the current frame and kernel
pub struct KernelFrame<'a> {
    pub(crate) executable: &'a LoadedExecutable,
    pub(crate) stack: &'a mut Vec<FunctionContext>,
    /// Stack position of the frame being stepped
    pub(crate) index: usize,
    pub(crate) pc: usize,
    pub(crate) kernel: &'a Kernel,
    pub(crate) control: &'a mut ContextControl,
    pub(crate) results: &'a mut Vec<Value>,
    pub(crate) ready: &'a mut Option<Box<ExecutionContext>>,
    pub(crate) reentered: bool,
}

impl<'a> KernelFrame<'a> {
    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The kernel being executed
    #[inline]
    pub fn kernel(&self) -> &Kernel {
        self.kernel
    }

    /// Position of the kernel in its function
    #[inline]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Number of live frames, including this one
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Function of the current frame
    pub fn function(&self) -> &Function {
        self.executable.function_at(self.stack[self.index].function)
    }

    /// The loaded executable
    pub fn executable(&self) -> &LoadedExecutable {
        self.executable
    }

    /// True when this step is the second visit of a re-entering call site
    #[inline]
    pub fn is_reentry(&self) -> bool {
        self.reentered
    }

    /// Immediate operand of the kernel
    #[inline]
    pub fn attribute(&self, index: usize) -> Option<u32> {
        self.kernel.attribute(index)
    }

    /// Current state of the context
    #[inline]
    pub fn state(&self) -> State {
        self.control.state
    }

    /// The context's control block
    pub fn control(&mut self) -> &mut ContextControl {
        self.control
    }

    // ------------------------------------------------------------------
    // Registers
    // ------------------------------------------------------------------

    /// The kernel's argument registers
    pub fn arguments(&self) -> RegisterSpan<'_> {
        RegisterSpan::new(&self.kernel.arguments, &self.stack[self.index].regs)
    }

    /// The kernel's result registers
    pub fn results(&self) -> RegisterSpan<'_> {
        RegisterSpan::new(&self.kernel.results, &self.stack[self.index].regs)
    }

    /// The `i`-th argument register
    pub fn argument(&self, i: usize) -> &Value {
        let reg = self.kernel.arguments[i] as usize;
        &self.stack[self.index].regs[reg]
    }

    /// Move the `i`-th argument out, leaving its register empty
    pub fn take_argument(&mut self, i: usize) -> Value {
        let reg = self.kernel.arguments[i] as usize;
        std::mem::take(&mut self.stack[self.index].regs[reg])
    }

    /// Write the `i`-th result register
    pub fn set_result(&mut self, i: usize, value: Value) {
        let reg = self.kernel.results[i] as usize;
        self.stack[self.index].regs[reg] = value;
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Call `function`; its return values land in this kernel's results
    ///
    /// Execution continues in the callee. After it returns, the caller
    /// resumes at the kernel after this one.
    pub fn call(&mut self, function: FunctionId, args: Vec<Value>) {
        debug_assert_eq!(self.control.state, State::Running);
        let results = self.kernel.results.clone();
        match push_frame(self.stack, self.executable, function, args, results) {
            Ok(()) => self.control.state = State::Ready,
            Err(error) => self.control.fail(error),
        }
    }

    /// Call `function` and step this kernel again once it returns
    ///
    /// On the second step [`is_reentry`](Self::is_reentry) reports `true`
    /// and the callee's return values are in this kernel's results.
    pub fn call_reentrant(&mut self, function: FunctionId, args: Vec<Value>) {
        self.call(function, args);
        if self.control.state == State::Ready {
            self.stack[self.index].kernel_context.reenter = true;
        }
    }

    /// Return `values` to the caller's result registers
    ///
    /// For the entry frame the values go to the exit handler.
    pub fn return_values(&mut self, values: Vec<Value>) {
        debug_assert_eq!(self.control.state, State::Running);
        let targets = std::mem::take(&mut self.stack[self.index].results);
        if values.len() != targets.len() {
            let function = self.function().name.clone();
            self.control.fail(VmError::ArityMismatch {
                function,
                expected: targets.len(),
                actual: values.len(),
            });
            self.stack[self.index].results = targets;
            return;
        }

        if self.index == 0 {
            for (&reg, value) in targets.iter().zip(values) {
                self.results[reg as usize] = value;
            }
        } else {
            let caller = &mut self.stack[self.index - 1];
            for (&reg, value) in targets.iter().zip(values) {
                caller.regs[reg as usize] = value;
            }
        }
        self.control.state = State::Return;
    }

    /// Suspend the context; see [`ContextControl::suspend`]
    pub fn suspend<F>(&mut self, handler: F)
    where
        F: FnOnce(Resumer) + Send + 'static,
    {
        self.control.suspend(handler);
    }

    /// Fail the context; see [`ContextControl::fail`]
    pub fn fail(&mut self, error: VmError) {
        self.control.fail(error);
    }

    // ------------------------------------------------------------------
    // Resumption
    // ------------------------------------------------------------------

    /// Resume another suspended context
    ///
    /// When this frame's context has just returned from its last frame and
    /// no other context is waiting on this thread, the resumed context runs
    /// next on this thread. Otherwise it goes to its work queue.
    pub fn resume(&mut self, resumer: Resumer) {
        let about_to_idle = self.control.state == State::Return && self.stack.len() == 1;
        if about_to_idle && self.ready.is_none() && !resumer.is_unwinding() {
            if let Some(context) = resumer.into_context() {
                *self.ready = Some(context);
            }
        } else {
            resumer.resume();
        }
    }
}
