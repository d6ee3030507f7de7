//! The execution loop
//!
//! Steps kernels of the top frame in program order until a kernel moves the
//! context out of `Running`, then performs the requested transition:
//!
//! ```text
//! Ready     -> continue in the callee (same thread)
//! Return    -> pop; finish or continue in the caller (same thread)
//! Suspended -> hand the context to its suspend handler and return
//! Error     -> unwind the frame stack
//! ```
//!
//! The loop owns a ready slot. Every `KernelFrame` borrows it, so a kernel
//! that wakes another context while its own context is finishing can seat
//! the woken context here instead of going through the work queue.

use super::context::{ExecutionContext, State};
use super::kernel_frame::KernelFrame;
use super::resumer::Resumer;
use super::unwind::{unwind, UnwindPoint};
use std::sync::Arc;
use tracing::{debug, trace_span};

/// Run `context` on the calling thread
///
/// Returns once the context has finished, suspended, or started unwinding,
/// and once any context handed to this thread has done the same.
pub fn execute(context: Box<ExecutionContext>) {
    let mut ready = Some(context);

    while let Some(mut context) = ready.take() {
        if context.function_stack.is_empty() {
            let results = std::mem::take(&mut context.results);
            context.control.finish(results);
            continue;
        }

        let executable = Arc::clone(&context.executable);
        let stack_index = context.function_stack.len() - 1;

        {
            let ExecutionContext {
                function_stack,
                control,
                results,
                ..
            } = &mut *context;

            let function = executable.function_at(function_stack[stack_index].function);
            let mut pc = function_stack[stack_index].pc;

            while control.state == State::Running {
                let Some(kernel) = function.kernels.get(pc) else {
                    panic!(
                        "function '{}' ran past its last kernel without returning",
                        function.name
                    );
                };
                let reentered =
                    std::mem::take(&mut function_stack[stack_index].kernel_context.reenter);
                let mut frame = KernelFrame {
                    executable: &*executable,
                    stack: &mut *function_stack,
                    index: stack_index,
                    pc,
                    kernel,
                    control: &mut *control,
                    results: &mut *results,
                    ready: &mut ready,
                    reentered,
                };
                (executable.kernel_fn(kernel.code).as_ref())(&mut frame);
                pc += 1;
            }

            // Kernels may have pushed frames; resolve by stack position.
            function_stack[stack_index].pc = pc;
        }

        match context.control.state {
            State::Ready => {
                debug_assert!(ready.is_none());
                context.control.state = State::Running;
                let caller = &mut context.function_stack[stack_index];
                if caller.kernel_context.reenter {
                    // Step the calling kernel again once the callee returns.
                    caller.pc -= 1;
                }
                ready = Some(context);
            }
            State::Running => unreachable!("execution loop left the step loop while running"),
            State::Return => {
                let _span = trace_span!("execute_return").entered();
                context.function_stack.pop();
                if context.function_stack.is_empty() {
                    debug!("execution context finished");
                    let results = std::mem::take(&mut context.results);
                    context.control.finish(results);
                    continue;
                }
                debug_assert!(ready.is_none());
                context.control.state = State::Running;
                ready = Some(context);
            }
            State::Suspended => {
                debug_assert!(ready.is_none());
                let _span = trace_span!("execute_suspend").entered();
                let handler = context.control.take_suspend_handler();
                handler(Resumer::execute(context));
                return;
            }
            State::Error => {
                debug_assert!(ready.is_none());
                let _span = trace_span!("execute_error").entered();
                unwind(context, UnwindPoint::NotStarted);
                return;
            }
        }
    }
}
