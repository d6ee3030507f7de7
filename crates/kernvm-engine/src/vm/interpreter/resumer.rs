//! Resumption of suspended execution contexts

use super::context::{ExecutionContext, State};
use super::execute::execute;
use super::unwind::{unwind, UnwindPoint};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Where a suspended context continues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumePoint {
    /// Continue stepping kernels
    Execute,
    /// Continue unwinding from the recorded register
    Unwind(UnwindPoint),
}

/// Continuation of a suspended execution context
///
/// Owns the context while it is suspended. `Resumer` is `Send`; it can be
/// parked in a waiter list and resumed from any thread.
pub struct Resumer {
    context: Option<Box<ExecutionContext>>,
    point: ResumePoint,
}

impl Resumer {
    pub(crate) fn execute(context: Box<ExecutionContext>) -> Self {
        Self {
            context: Some(context),
            point: ResumePoint::Execute,
        }
    }

    pub(crate) fn unwind(context: Box<ExecutionContext>, point: UnwindPoint) -> Self {
        Self {
            context: Some(context),
            point: ResumePoint::Unwind(point),
        }
    }

    /// True if the context suspended while unwinding an error
    pub fn is_unwinding(&self) -> bool {
        matches!(self.point, ResumePoint::Unwind(_))
    }

    /// Make the context runnable again by submitting it to its work queue
    pub fn resume(mut self) {
        let Some(context) = self.take_runnable() else {
            return;
        };
        let queue = Arc::clone(context.work_queue());
        match self.point {
            ResumePoint::Execute => queue.add_task(Box::new(move || execute(context))),
            ResumePoint::Unwind(point) => queue.add_task(Box::new(move || unwind(context, point))),
        }
    }

    /// Take the context for a same-thread hand-off
    pub(crate) fn into_context(mut self) -> Option<Box<ExecutionContext>> {
        debug_assert_eq!(self.point, ResumePoint::Execute);
        self.take_runnable()
    }

    /// Release the context in the state it continues from
    fn take_runnable(&mut self) -> Option<Box<ExecutionContext>> {
        let mut context = self.context.take()?;
        context.control.state = match self.point {
            ResumePoint::Execute => State::Running,
            ResumePoint::Unwind(_) => State::Error,
        };
        Some(context)
    }
}

impl Drop for Resumer {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            warn!(
                depth = context.function_stack_size(),
                "suspended execution context dropped without being resumed"
            );
        }
    }
}

impl fmt::Debug for Resumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resumer")
            .field("point", &self.point)
            .field("context", &self.context)
            .finish()
    }
}
