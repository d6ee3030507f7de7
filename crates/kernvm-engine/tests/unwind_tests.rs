//! Error unwinding: which registers see the error, in what order, and how
//! a suspending error hook resumes the walk

mod common;

use common::{init_tracing, strings, Harness, Tracked};
use kernvm_engine::{Function, ManualQueue, State, Value, VmError};
use std::sync::Arc;

fn tracked(h: &Harness, label: &str) -> Value {
    Value::with_error_handler(Tracked {
        label: label.to_string(),
        log: h.unwound.clone(),
    })
}

#[test]
fn test_error_visits_live_results_in_program_order() {
    init_tracing();
    let mut h = Harness::new();
    let k0 = h.op("tracked", &[], &[0], &[]);
    let k1 = h.op("tracked", &[], &[1], &[]);
    let k2 = h.op("fail", &[], &[], &[]);
    let k3 = h.op("tracked", &[], &[2], &[]);
    let main = h.add_function(Function::new("main", 3).kernel(k0).kernel(k1).kernel(k2).kernel(k3));

    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue.clone(), main, Vec::new(), 0);
    context.run();

    // r2 belongs to a kernel that never ran.
    assert_eq!(h.unwound(), strings(&["main:r0", "main:r1"]));
    assert_eq!(exit.calls(), 1);
    assert_eq!(
        exit.take_outcome().map(|outcome| outcome.err()),
        Some(Some(VmError::Kernel("boom".to_string())))
    );
    assert!(queue.is_empty());
}

#[test]
fn test_error_visits_inputs_before_results() {
    let mut h = Harness::new();
    let k0 = h.op("tracked", &[], &[2], &[]);
    let k1 = h.op("fail", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 3).with_inputs([0, 1]).kernel(k0).kernel(k1));

    let args = vec![tracked(&h, "in:a"), tracked(&h, "in:b")];
    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue, main, args, 0);
    context.run();

    assert_eq!(h.unwound(), strings(&["in:a", "in:b", "main:r2"]));
    assert_eq!(exit.calls(), 1);
}

#[test]
fn test_nested_error_unwinds_callee_then_caller() {
    let mut h = Harness::new();

    let c0 = h.op("tracked", &[], &[0], &[]);
    let c1 = h.op("tracked", &[], &[1], &[]);
    let c2 = h.op("fail", &[], &[], &[]);
    let callee = h.add_function(Function::new("callee", 2).kernel(c0).kernel(c1).kernel(c2));

    let m0 = h.op("tracked", &[], &[1], &[]);
    let m1 = h.op("call", &[], &[2], &[callee.as_u32()]);
    let m2 = h.op("return", &[], &[], &[]);
    let main = h.add_function(
        Function::new("main", 3)
            .with_inputs([0])
            .kernel(m0)
            .kernel(m1)
            .kernel(m2),
    );

    let args = vec![tracked(&h, "main:input")];
    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue, main, args, 0);
    context.run();

    assert_eq!(
        h.unwound(),
        strings(&["callee:r0", "callee:r1", "main:input", "main:r1"])
    );
    assert_eq!(exit.calls(), 1);
    assert!(matches!(exit.take_outcome(), Some(Err(VmError::Kernel(_)))));
}

#[test]
fn test_registers_already_moved_are_not_visited() {
    let mut h = Harness::new();

    // The callee returns r0 to main's r1; main's r1 is visited once, as the
    // result of the call kernel, and the callee frame is gone.
    let c0 = h.op("tracked", &[], &[0], &[]);
    let c1 = h.op("return", &[0], &[], &[]);
    let callee = h.add_function(Function::new("callee", 1).kernel(c0).kernel(c1));

    let m0 = h.op("call", &[], &[1], &[callee.as_u32()]);
    let m1 = h.op("fail", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 2).kernel(m0).kernel(m1));

    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue, main, Vec::new(), 0);
    context.run();

    assert_eq!(h.unwound(), strings(&["callee:r0"]));
    assert_eq!(exit.calls(), 1);
}

#[test]
fn test_suspending_hook_resumes_at_next_register() {
    let mut h = Harness::new();
    let k0 = h.op("tracked", &[], &[0], &[]);
    let k1 = h.op("stalling", &[], &[1], &[]);
    let k2 = h.op("tracked", &[], &[2, 3], &[]);
    let k3 = h.op("fail", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 4).kernel(k0).kernel(k1).kernel(k2).kernel(k3));

    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue.clone(), main, Vec::new(), 0);
    context.run();

    assert_eq!(h.unwound(), strings(&["main:r0", "main:r1"]));
    assert_eq!(exit.calls(), 0);
    assert!(queue.is_empty());

    let resumer = h.unpark().expect("stalling hook parked a resumer");
    assert!(resumer.is_unwinding());
    resumer.resume();
    assert_eq!(queue.len(), 1);
    queue.run_until_idle();

    assert_eq!(
        h.unwound(),
        strings(&["main:r0", "main:r1", "main:r2", "main:r3"])
    );
    assert_eq!(exit.calls(), 1);
    assert!(matches!(exit.take_outcome(), Some(Err(VmError::Kernel(_)))));
}

#[test]
fn test_suspending_input_hook_resumes_at_next_input() {
    let mut h = Harness::new();
    let k0 = h.op("fail", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 3).with_inputs([0, 1, 2]).kernel(k0));

    let stalling = Value::with_error_handler(common::Stalling {
        label: "in:b".to_string(),
        log: h.unwound.clone(),
        parked: h.parked.clone(),
    });
    let args = vec![tracked(&h, "in:a"), stalling, tracked(&h, "in:c")];
    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue.clone(), main, args, 0);
    context.run();

    assert_eq!(h.unwound(), strings(&["in:a", "in:b"]));
    h.unpark().unwrap().resume();
    queue.run_until_idle();

    assert_eq!(h.unwound(), strings(&["in:a", "in:b", "in:c"]));
    assert_eq!(exit.calls(), 1);
}

#[test]
fn test_suspension_in_callee_frame_continues_into_caller() {
    let mut h = Harness::new();

    let c0 = h.op("stalling", &[], &[0], &[]);
    let c1 = h.op("tracked", &[], &[1], &[]);
    let c2 = h.op("fail", &[], &[], &[]);
    let callee = h.add_function(Function::new("callee", 2).kernel(c0).kernel(c1).kernel(c2));

    let m0 = h.op("tracked", &[], &[0], &[]);
    let m1 = h.op("call", &[], &[], &[callee.as_u32()]);
    let m2 = h.op("return", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 1).kernel(m0).kernel(m1).kernel(m2));

    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue.clone(), main, Vec::new(), 0);
    context.run();
    assert_eq!(h.unwound(), strings(&["callee:r0"]));

    h.unpark().unwrap().resume();
    queue.run_until_idle();

    assert_eq!(
        h.unwound(),
        strings(&["callee:r0", "callee:r1", "main:r0"])
    );
    assert_eq!(exit.calls(), 1);
}

#[test]
fn test_unwinding_resumer_never_takes_fast_path() {
    let mut h = Harness::new();
    let park = h.parked.clone();
    h.registry.register("return_and_wake", move |frame| {
        frame.return_values(Vec::new());
        let resumer = park.lock().pop();
        if let Some(resumer) = resumer {
            frame.resume(resumer);
        }
    });

    let k0 = h.op("stalling", &[], &[0], &[]);
    let k1 = h.op("fail", &[], &[], &[]);
    let failing = h.add_function(Function::new("failing", 1).kernel(k0).kernel(k1));
    let k = h.op("return_and_wake", &[], &[], &[]);
    let waker = h.add_function(Function::new("waker", 0).kernel(k));

    let queue = Arc::new(ManualQueue::new());
    let (a, a_exit) = h.context(queue.clone(), failing, Vec::new(), 0);
    let (b, b_exit) = h.context(queue.clone(), waker, Vec::new(), 0);
    a.run();
    b.run();

    assert_eq!(b_exit.calls(), 1);
    assert_eq!(a_exit.calls(), 0);
    assert_eq!(queue.len(), 1);
    queue.run_until_idle();
    assert_eq!(a_exit.calls(), 1);
    assert_eq!(h.unwound(), strings(&["failing:r0"]));
}

#[test]
fn test_cancel_suspended_context_by_failing_resumed_kernel() {
    let mut h = Harness::new();
    let k0 = h.op("tracked", &[], &[0], &[]);
    let k1 = h.op("await", &[], &[], &[]);
    let k2 = h.op("fail", &[], &[], &[]);
    let k3 = h.op("return", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 1).kernel(k0).kernel(k1).kernel(k2).kernel(k3));

    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue.clone(), main, Vec::new(), 0);
    context.run();
    assert!(h.unwound().is_empty());

    h.unpark().unwrap().resume();
    queue.run_until_idle();

    assert_eq!(h.unwound(), strings(&["main:r0"]));
    assert_eq!(exit.calls(), 1);
}

#[test]
fn test_fail_before_run_unwinds_entry_inputs() {
    let mut h = Harness::new();
    let k0 = h.op("record", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 1).with_inputs([0]).kernel(k0));

    let args = vec![tracked(&h, "in:a")];
    let queue = Arc::new(ManualQueue::new());
    let (mut context, exit) = h.context(queue, main, args, 0);
    context.fail(VmError::Cancelled);
    assert_eq!(context.state(), State::Error);
    context.run();

    assert!(h.trace().is_empty());
    assert_eq!(h.unwound(), strings(&["in:a"]));
    assert!(matches!(exit.take_outcome(), Some(Err(VmError::Cancelled))));
}

#[test]
fn test_reentering_caller_unwinds_its_calling_kernel_results() {
    let mut h = Harness::new();
    let hooks = h.unwound.clone();
    // First visit: publish a pending handle, then call and wait to re-enter.
    h.registry.register("async_call", move |frame| {
        if frame.is_reentry() {
            return;
        }
        frame.set_result(
            0,
            Value::with_error_handler(Tracked {
                label: "main:future".to_string(),
                log: hooks.clone(),
            }),
        );
        let callee = kernvm_engine::FunctionId::new(frame.attribute(0).unwrap_or(u32::MAX));
        frame.call_reentrant(callee, Vec::new());
    });

    let c0 = h.op("fail", &[], &[], &[]);
    let callee = h.add_function(Function::new("callee", 0).kernel(c0));

    let m0 = h.op("tracked", &[], &[1], &[]);
    let m1 = h.op("async_call", &[], &[0], &[callee.as_u32()]);
    let m2 = h.op("return", &[], &[], &[]);
    let main = h.add_function(Function::new("main", 2).kernel(m0).kernel(m1).kernel(m2));

    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue, main, Vec::new(), 0);
    context.run();

    assert_eq!(h.unwound(), strings(&["main:r1", "main:future"]));
    assert_eq!(exit.calls(), 1);
    assert!(matches!(exit.take_outcome(), Some(Err(VmError::Kernel(_)))));
}

#[test]
fn test_register_named_by_several_listings_is_visited_once() {
    let mut h = Harness::new();
    // r0 is an input and the result of two kernels; r1 is listed twice by
    // one kernel.
    let k0 = h.op("tracked", &[], &[0], &[]);
    let k1 = h.op("tracked", &[], &[0, 1, 1], &[]);
    let k2 = h.op("fail", &[], &[], &[]);
    let main = h.add_function(
        Function::new("main", 2)
            .with_inputs([0])
            .kernel(k0)
            .kernel(k1)
            .kernel(k2),
    );

    let args = vec![tracked(&h, "in:a")];
    let queue = Arc::new(ManualQueue::new());
    let (context, exit) = h.context(queue, main, args, 0);
    context.run();

    assert_eq!(h.unwound(), strings(&["main:r0", "main:r1"]));
    assert_eq!(exit.calls(), 1);
}
