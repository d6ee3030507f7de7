//! Shared fixtures for interpreter integration tests
//!
//! `Harness` owns an executable under construction plus a registry of small
//! kernels that record what they do into a shared trace.

#![allow(dead_code)]

use kernvm_engine::{
    ContextControl, Executable, ExecutionContext, Function, FunctionId, HandleError, Kernel,
    KernelRegistry, LoadedExecutable, Resumer, Value, VmError, VmResult, WorkQueue,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub type Log = Arc<Mutex<Vec<String>>>;
pub type Parking = Arc<Mutex<Vec<Resumer>>>;

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Register payload that records each error hook call
pub struct Tracked {
    pub label: String,
    pub log: Log,
}

impl HandleError for Tracked {
    fn handle_error(&mut self, _control: &mut ContextControl) {
        self.log.lock().push(self.label.clone());
    }
}

/// Register payload whose error hook must wait: it records the call and
/// suspends the context, parking the resumer
pub struct Stalling {
    pub label: String,
    pub log: Log,
    pub parked: Parking,
}

impl HandleError for Stalling {
    fn handle_error(&mut self, control: &mut ContextControl) {
        self.log.lock().push(self.label.clone());
        let parked = self.parked.clone();
        control.suspend(move |resumer| parked.lock().push(resumer));
    }
}

/// Records exit handler invocations
#[derive(Default)]
pub struct ExitProbe {
    calls: AtomicUsize,
    outcome: Mutex<Option<VmResult<Vec<Value>>>>,
}

impl ExitProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn take_outcome(&self) -> Option<VmResult<Vec<Value>>> {
        self.outcome.lock().take()
    }

    /// The exit outcome as plain integers
    pub fn take_ints(&self) -> Option<VmResult<Vec<i64>>> {
        self.take_outcome().map(|outcome| {
            outcome.map(|values| values.iter().map(|v| *v.get::<i64>().unwrap_or(&-1)).collect())
        })
    }
}

pub struct Harness {
    pub exe: Executable,
    pub registry: KernelRegistry,
    /// Kernel steps, as `function:pc:tag`
    pub trace: Log,
    /// Error hook calls, by register label
    pub unwound: Log,
    /// Resumers parked by `await` kernels and stalling registers
    pub parked: Parking,
}

fn record(log: &Log, frame: &kernvm_engine::KernelFrame<'_>, tag: &str) {
    log.lock()
        .push(format!("{}:{}:{}", frame.function().name, frame.pc(), tag));
}

fn copy_ints(frame: &kernvm_engine::KernelFrame<'_>) -> Vec<Value> {
    frame
        .arguments()
        .iter()
        .map(|v| v.get::<i64>().map(|x| Value::new(*x)).unwrap_or_default())
        .collect()
}

impl Harness {
    pub fn new() -> Self {
        let trace: Log = Arc::default();
        let unwound: Log = Arc::default();
        let parked: Parking = Arc::default();
        let mut registry = KernelRegistry::new();

        // record: no effect beyond the trace
        let log = trace.clone();
        registry.register("record", move |frame| record(&log, frame, "record"));

        // const: result 0 = attribute 0
        let log = trace.clone();
        registry.register("const", move |frame| {
            record(&log, frame, "const");
            let value = frame.attribute(0).unwrap_or(0) as i64;
            frame.set_result(0, Value::new(value));
        });

        // add: result 0 = sum of integer arguments
        let log = trace.clone();
        registry.register("add", move |frame| {
            record(&log, frame, "add");
            let sum: i64 = frame.arguments().iter().filter_map(|v| v.get::<i64>()).sum();
            frame.set_result(0, Value::new(sum));
        });

        // depth: result 0 = number of live frames
        let log = trace.clone();
        registry.register("depth", move |frame| {
            record(&log, frame, &format!("depth={}", frame.depth()));
            let depth = frame.depth() as i64;
            frame.set_result(0, Value::new(depth));
        });

        // call: call function attribute 0 with copies of the integer arguments
        let log = trace.clone();
        registry.register("call", move |frame| {
            record(&log, frame, "call");
            let callee = FunctionId::new(frame.attribute(0).unwrap_or(u32::MAX));
            let args = copy_ints(frame);
            frame.call(callee, args);
        });

        // call_reentrant: call, then collect on the second visit
        let log = trace.clone();
        registry.register("call_reentrant", move |frame| {
            if frame.is_reentry() {
                record(&log, frame, "collect");
                return;
            }
            record(&log, frame, "call");
            let callee = FunctionId::new(frame.attribute(0).unwrap_or(u32::MAX));
            let args = copy_ints(frame);
            frame.call_reentrant(callee, args);
        });

        // return: move the arguments to the caller
        let log = trace.clone();
        registry.register("return", move |frame| {
            record(&log, frame, "return");
            let values = (0..frame.kernel().arguments.len())
                .map(|i| frame.take_argument(i))
                .collect();
            frame.return_values(values);
        });

        // fail: report a kernel error
        let log = trace.clone();
        registry.register("fail", move |frame| {
            record(&log, frame, "fail");
            frame.fail(VmError::kernel("boom"));
        });

        // tracked: every result gets a payload that logs its error hook
        let log = trace.clone();
        let hooks = unwound.clone();
        registry.register("tracked", move |frame| {
            record(&log, frame, "tracked");
            let name = frame.function().name.clone();
            for i in 0..frame.kernel().results.len() {
                let label = format!("{}:r{}", name, frame.kernel().results[i]);
                let value = Value::with_error_handler(Tracked {
                    label,
                    log: hooks.clone(),
                });
                frame.set_result(i, value);
            }
        });

        // stalling: every result gets a payload whose error hook suspends
        let log = trace.clone();
        let hooks = unwound.clone();
        let park = parked.clone();
        registry.register("stalling", move |frame| {
            record(&log, frame, "stalling");
            let name = frame.function().name.clone();
            for i in 0..frame.kernel().results.len() {
                let label = format!("{}:r{}", name, frame.kernel().results[i]);
                let value = Value::with_error_handler(Stalling {
                    label,
                    log: hooks.clone(),
                    parked: park.clone(),
                });
                frame.set_result(i, value);
            }
        });

        // await: suspend and park the resumer
        let log = trace.clone();
        let park = parked.clone();
        registry.register("await", move |frame| {
            record(&log, frame, "await");
            let park = park.clone();
            frame.suspend(move |resumer| park.lock().push(resumer));
        });

        Self {
            exe: Executable::new(),
            registry,
            trace,
            unwound,
            parked,
        }
    }

    /// Opcode for a registered kernel
    pub fn code(&mut self, name: &str) -> u32 {
        self.exe.kernel_code(name)
    }

    /// Shorthand for a kernel with the given operands
    pub fn op(&mut self, name: &str, args: &[u32], results: &[u32], attrs: &[u32]) -> Kernel {
        Kernel::new(self.code(name))
            .with_arguments(args)
            .with_results(results)
            .with_attributes(attrs)
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.exe.add_function(function)
    }

    pub fn load(&self) -> Arc<LoadedExecutable> {
        Arc::new(LoadedExecutable::new(self.exe.clone(), &self.registry).expect("executable loads"))
    }

    /// Build a context calling `entry`, with an exit probe attached
    pub fn context(
        &self,
        queue: Arc<dyn WorkQueue>,
        entry: FunctionId,
        args: Vec<Value>,
        result_count: usize,
    ) -> (ExecutionContext, Arc<ExitProbe>) {
        let mut context = ExecutionContext::new(self.load(), queue);
        context
            .call(entry, args, result_count)
            .expect("entry call accepted");
        let probe = Arc::new(ExitProbe::default());
        let exit = probe.clone();
        context.set_exit_handler(move |outcome| {
            exit.calls.fetch_add(1, Ordering::SeqCst);
            *exit.outcome.lock() = Some(outcome);
        });
        (context, probe)
    }

    pub fn trace(&self) -> Vec<String> {
        self.trace.lock().clone()
    }

    pub fn unwound(&self) -> Vec<String> {
        self.unwound.lock().clone()
    }

    /// Take the oldest parked resumer
    pub fn unpark(&self) -> Option<Resumer> {
        let mut parked = self.parked.lock();
        if parked.is_empty() {
            None
        } else {
            Some(parked.remove(0))
        }
    }
}

/// Strings for a list of literals
pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
