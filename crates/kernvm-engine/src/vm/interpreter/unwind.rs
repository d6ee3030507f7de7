//! Error unwinding
//!
//! After a kernel fails, every live frame is visited from the top of the
//! stack down. Each frame offers its input registers, then the result
//! registers of every kernel it has executed, to [`Value::handle_error`].
//! A frame rewound for re-entry counts the kernel at its pc as executed.
//! A register hook may suspend the context; the walk then stops and resumes
//! later at the register after the one that suspended.
//!
//! [`Value::handle_error`]: crate::vm::value::Value::handle_error

use super::context::{ContextControl, ExecutionContext, FunctionContext, State};
use super::resumer::Resumer;
use crate::bytecode::Function;
use crate::vm::register_span::RegisterSpanMut;
use std::sync::Arc;
use tracing::{debug, trace_span};

/// Position of the unwind walk within the top frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindPoint {
    /// Frame not visited yet
    NotStarted,
    /// Next input register to visit
    Inputs {
        /// Position in the function's input list
        next: usize,
    },
    /// Next result register to visit
    Results {
        /// Kernel whose results are being visited
        pc: usize,
        /// Position in the kernel's result list
        next: usize,
    },
}

/// Unwind `context` starting at `point` in its top frame
pub(crate) fn unwind(mut context: Box<ExecutionContext>, mut point: UnwindPoint) {
    let executable = Arc::clone(&context.executable);

    loop {
        let suspended_at = {
            let ExecutionContext {
                function_stack,
                control,
                ..
            } = &mut *context;

            let depth = function_stack.len();
            let Some(frame) = function_stack.last_mut() else {
                break;
            };
            debug_assert_eq!(control.state, State::Error);

            let _span = trace_span!("unwind_frame", depth).entered();
            let function = executable.function_at(frame.function);
            unwind_frame(function, frame, control, point)
        };

        if let Some(point) = suspended_at {
            debug_assert_eq!(context.control.state, State::Suspended);
            let handler = context.control.take_suspend_handler();
            handler(Resumer::unwind(context, point));
            return;
        }

        context.function_stack.pop();
        point = UnwindPoint::NotStarted;
    }

    debug!(error = ?context.control.error, "execution context unwound");
    let results = std::mem::take(&mut context.results);
    context.control.finish(results);
}

/// Visit the live registers of one frame
///
/// Returns the point to resume at if a register hook suspended the context.
/// A register named by several listings (input and result, or results of
/// two kernels) is offered the error only at its first listing.
fn unwind_frame(
    function: &Function,
    frame: &mut FunctionContext,
    control: &mut ContextControl,
    point: UnwindPoint,
) -> Option<UnwindPoint> {
    // A caller waiting to re-enter has already run the kernel at its pc.
    let executed = frame.pc + usize::from(frame.kernel_context.reenter);
    let (input_start, mut kernel_pc, mut result_start) = match point {
        UnwindPoint::NotStarted => (Some(0), 0, 0),
        UnwindPoint::Inputs { next } => (Some(next), 0, 0),
        UnwindPoint::Results { pc, next } => (None, pc, next),
    };

    if let Some(start) = input_start {
        let mut inputs = RegisterSpanMut::new(&function.input_regs, &mut frame.regs);
        for i in start..inputs.len() {
            if !function.input_regs[..i].contains(&function.input_regs[i]) {
                inputs.get_mut(i).handle_error(control);
            }
            if control.state != State::Error {
                return Some(UnwindPoint::Inputs { next: i + 1 });
            }
        }
    }

    while kernel_pc < executed {
        let kernel = &function.kernels[kernel_pc];
        let mut results = RegisterSpanMut::new(&kernel.results, &mut frame.regs);
        for i in result_start..results.len() {
            if !listed_before(function, kernel_pc, i) {
                results.get_mut(i).handle_error(control);
            }
            if control.state != State::Error {
                return Some(UnwindPoint::Results {
                    pc: kernel_pc,
                    next: i + 1,
                });
            }
        }
        kernel_pc += 1;
        result_start = 0;
    }

    None
}

/// Whether result `i` of kernel `pc` names a register already visited as an
/// input or as an earlier result
fn listed_before(function: &Function, pc: usize, i: usize) -> bool {
    let kernel = &function.kernels[pc];
    let reg = kernel.results[i];
    function.input_regs.contains(&reg)
        || kernel.results[..i].contains(&reg)
        || function.kernels[..pc]
            .iter()
            .any(|earlier| earlier.results.contains(&reg))
}
