//! Execution contexts and call frames
//!
//! An [`ExecutionContext`] is one interpreter instance: a stack of
//! [`FunctionContext`] activation records plus the [`ContextControl`] block
//! holding the state machine and the one-shot handlers.
//!
//! Contexts move by value. While a context is suspended it is owned by the
//! [`Resumer`] handed to its suspend handler, so nothing else can touch its
//! registers until it is resumed.

use super::execute::execute;
use super::registry::LoadedExecutable;
use super::resumer::Resumer;
use crate::bytecode::{FunctionId, RegIndex};
use crate::vm::scheduler::WorkQueue;
use crate::vm::value::Value;
use crate::vm::{VmError, VmResult};
use std::fmt;
use std::sync::Arc;

/// State of an execution context
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Stepping kernels in the top frame
    Running,
    /// A kernel pushed a new frame; continue in the callee
    Ready,
    /// The top frame returned; pop it
    Return,
    /// Waiting on external work; the suspend handler owns the context
    Suspended,
    /// A kernel failed; unwind the frame stack
    Error,
}

/// One-shot handler invoked when a context suspends
pub type SuspendHandler = Box<dyn FnOnce(Resumer) + Send>;

/// One-shot handler invoked when a context's frame stack empties
///
/// Receives the top-level return values, or the first recorded error if the
/// context finished by unwinding.
pub type ExitHandler = Box<dyn FnOnce(VmResult<Vec<Value>>) + Send>;

/// State machine and one-shot handlers of an execution context
///
/// Kernel bodies reach this through `KernelFrame`; register error hooks
/// receive it directly during unwinding.
pub struct ContextControl {
    pub(crate) state: State,
    pub(crate) suspend_handler: Option<SuspendHandler>,
    pub(crate) exit_handler: Option<ExitHandler>,
    pub(crate) error: Option<VmError>,
}

impl ContextControl {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Running,
            suspend_handler: None,
            exit_handler: None,
            error: None,
        }
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// First error recorded by `fail`
    pub fn error(&self) -> Option<&VmError> {
        self.error.as_ref()
    }

    /// Suspend the context
    ///
    /// `handler` is called exactly once, after the current kernel or error
    /// hook returns, with the [`Resumer`] that owns the context. Whoever
    /// holds the resumer must eventually call [`Resumer::resume`].
    pub fn suspend<F>(&mut self, handler: F)
    where
        F: FnOnce(Resumer) + Send + 'static,
    {
        debug_assert!(
            matches!(self.state, State::Running | State::Error),
            "suspend requested in state {:?}",
            self.state
        );
        self.suspend_handler = Some(Box::new(handler));
        self.state = State::Suspended;
    }

    /// Fail the context
    ///
    /// The first error wins; later failures only keep the state at `Error`.
    pub fn fail(&mut self, error: VmError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.state = State::Error;
    }

    pub(crate) fn take_suspend_handler(&mut self) -> SuspendHandler {
        match self.suspend_handler.take() {
            Some(handler) => handler,
            None => panic!("execution context suspended without a suspend handler"),
        }
    }

    /// Fire the exit handler, if any. Consumes the handler.
    pub(crate) fn finish(&mut self, results: Vec<Value>) {
        if let Some(handler) = self.exit_handler.take() {
            let outcome = match self.error.take() {
                Some(error) => Err(error),
                None => Ok(results),
            };
            handler(outcome);
        }
    }
}

impl fmt::Debug for ContextControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextControl")
            .field("state", &self.state)
            .field("suspend_handler", &self.suspend_handler.is_some())
            .field("exit_handler", &self.exit_handler.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Per-frame scratch state visible to kernels
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct KernelContext {
    /// Step the calling kernel again once the callee returns
    pub(crate) reenter: bool,
}

/// One activation of a function
#[derive(Debug)]
pub struct FunctionContext {
    pub(crate) function: FunctionId,
    /// Index of the next kernel to execute
    pub(crate) pc: usize,
    pub(crate) regs: Vec<Value>,
    /// Caller registers receiving this frame's return values
    pub(crate) results: Vec<RegIndex>,
    pub(crate) kernel_context: KernelContext,
}

impl FunctionContext {
    /// Function this frame activates
    pub fn function(&self) -> FunctionId {
        self.function
    }

    /// Index of the next kernel to execute
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// The frame's register file
    pub fn regs(&self) -> &[Value] {
        &self.regs
    }
}

/// Push a frame for `function`, moving `args` into its input registers
pub(crate) fn push_frame(
    stack: &mut Vec<FunctionContext>,
    executable: &LoadedExecutable,
    function: FunctionId,
    args: Vec<Value>,
    results: Vec<RegIndex>,
) -> VmResult<()> {
    let callee = executable
        .function(function)
        .ok_or_else(|| VmError::UnknownFunction(format!("#{}", function.as_u32())))?;

    if args.len() != callee.input_regs.len() {
        return Err(VmError::ArityMismatch {
            function: callee.name.clone(),
            expected: callee.input_regs.len(),
            actual: args.len(),
        });
    }

    let mut regs: Vec<Value> = std::iter::repeat_with(Value::empty)
        .take(callee.num_regs as usize)
        .collect();
    for (&reg, arg) in callee.input_regs.iter().zip(args) {
        regs[reg as usize] = arg;
    }

    stack.push(FunctionContext {
        function,
        pc: 0,
        regs,
        results,
        kernel_context: KernelContext::default(),
    });
    Ok(())
}

/// An interpreter instance
pub struct ExecutionContext {
    pub(crate) executable: Arc<LoadedExecutable>,
    work_queue: Arc<dyn WorkQueue>,
    pub(crate) function_stack: Vec<FunctionContext>,
    pub(crate) control: ContextControl,
    /// Return values of the entry function
    pub(crate) results: Vec<Value>,
}

impl ExecutionContext {
    /// Create a context with an empty frame stack
    ///
    /// Resumed work and error unwinding continuations are submitted to
    /// `work_queue`.
    pub fn new(executable: Arc<LoadedExecutable>, work_queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            executable,
            work_queue,
            function_stack: Vec::new(),
            control: ContextControl::new(),
            results: Vec::new(),
        }
    }

    /// Push the entry frame
    ///
    /// `result_count` values are expected from the entry function's return
    /// and are delivered to the exit handler.
    pub fn call(&mut self, function: FunctionId, args: Vec<Value>, result_count: usize) -> VmResult<()> {
        if !self.function_stack.is_empty() {
            return Err(VmError::RuntimeError(
                "execution context already has an entry frame".to_string(),
            ));
        }
        self.results = std::iter::repeat_with(Value::empty)
            .take(result_count)
            .collect();
        let result_regs = (0..result_count as RegIndex).collect();
        push_frame(
            &mut self.function_stack,
            &self.executable,
            function,
            args,
            result_regs,
        )
    }

    /// Install the exit handler
    pub fn set_exit_handler<F>(&mut self, handler: F)
    where
        F: FnOnce(VmResult<Vec<Value>>) + Send + 'static,
    {
        self.control.exit_handler = Some(Box::new(handler));
    }

    /// Fail the context before (or instead of) running it
    pub fn fail(&mut self, error: VmError) {
        self.control.fail(error);
    }

    /// Current state
    pub fn state(&self) -> State {
        self.control.state
    }

    /// Number of live frames
    pub fn function_stack_size(&self) -> usize {
        self.function_stack.len()
    }

    /// Frame at the top of the stack
    pub fn current_function(&self) -> Option<&FunctionContext> {
        self.function_stack.last()
    }

    /// The loaded executable this context runs
    pub fn executable(&self) -> &Arc<LoadedExecutable> {
        &self.executable
    }

    /// The work queue used for resumption
    pub fn work_queue(&self) -> &Arc<dyn WorkQueue> {
        &self.work_queue
    }

    /// Run the context on the calling thread until it suspends, fails, or
    /// finishes
    pub fn run(self) {
        execute(Box::new(self));
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("state", &self.control.state)
            .field("depth", &self.function_stack.len())
            .field("error", &self.control.error)
            .finish()
    }
}
