//! Closure creation and the call/return protocol.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::RuntimeError;
use crate::resource::Cancellation;
use crate::stash::Stash;
use crate::tracer::{TraceEvent, VmTracer};
use crate::value::{CompiledFunction, Function, Invoker, Value};

use super::{Frame, GlobalLookup, Vm};

/// Holds a call's argument values inline for the common case of a
/// handful of arguments, only spilling to the heap past that.
type ArgBuf = SmallVec<[Value; 4]>;

/// Builds a closure `Value` from the compile-time template left in the
/// constant pool by `MakeFunction`'s operand. The template's `program`
/// field is a dangling placeholder (see `CompiledFunction::program`'s
/// doc comment); the real, live program only becomes known once a
/// function is actually instantiated here, from the frame that is
/// instantiating it.
pub(super) fn make_function<C: Cancellation, T: VmTracer>(vm: &mut Vm<C, T>, const_idx: u32) -> Value {
    let frame = vm.frames.last().expect("MakeFunction runs inside an active frame");
    let template = match &frame.program.consts[const_idx as usize] {
        Value::Function(Function::Compiled(f)) => Rc::clone(f),
        other => unreachable!("MakeFunction operand must be a compiled-function template, got {other:?}"),
    };
    let program_weak = Rc::downgrade(&frame.program);
    let captured = if template.needs_stash {
        Some(frame.stash.clone().expect("enclosing scope must have a stash when it creates a capturing closure"))
    } else {
        None
    };
    Value::Function(Function::Compiled(Rc::new(CompiledFunction {
        name: template.name.clone(),
        program: program_weak,
        entry: template.entry,
        arity: template.arity,
        frame_size: template.frame_size,
        needs_stash: template.needs_stash,
        captured,
    })))
}

/// Executes `Call(argc)`: pops `argc` arguments and the callee off the
/// operand stack and either pushes a new VM frame (compiled functions)
/// or invokes the native callback inline (native functions, which never
/// recurse into `dispatch`).
pub(super) fn dispatch_call<C: Cancellation, T: VmTracer>(
    vm: &mut Vm<C, T>,
    argc: u32,
    globals: &dyn GlobalLookup,
) -> Result<(), RuntimeError> {
    let argc = argc as usize;
    let args_start = vm.stack.len() - argc;
    let args: ArgBuf = vm.stack.split_off(args_start).into();
    let callee = vm.pop();

    let func = callee.to_function();

    match &func {
        Function::Native(native) => {
            let value = (native.func)(&args, &mut VmInvoker { vm, globals })?;
            vm.push(value);
            Ok(())
        }
        Function::Compiled(compiled) => push_compiled_frame(vm, compiled, &args),
    }
}

fn push_compiled_frame<C: Cancellation, T: VmTracer>(
    vm: &mut Vm<C, T>,
    compiled: &Rc<CompiledFunction>,
    args: &[Value],
) -> Result<(), RuntimeError> {
    if vm.frames.len() >= vm.max_depth {
        return Err(RuntimeError::StackOverflow { depth: vm.max_depth });
    }
    let program = compiled
        .program
        .upgrade()
        .expect("the program outlives every function value derived from it while the host holds it");

    let padded_args = pad_args(args, compiled.arity);

    let (bp, stash) = if compiled.needs_stash {
        let stash = Stash::new(compiled.frame_size, compiled.captured.clone());
        for (i, arg) in padded_args.iter().enumerate() {
            stash.store(0, i, arg.clone());
        }
        (vm.stack.len(), Some(stash))
    } else {
        let bp = vm.stack.len();
        vm.stack.extend(padded_args);
        vm.stack.resize(bp + compiled.frame_size, Value::Null);
        (bp, None)
    };

    vm.tracer.on_call(TraceEvent::Call {
        name: compiled.name.as_deref(),
        depth: vm.frames.len() + 1,
    });

    vm.frames.push(Frame {
        program,
        ip: compiled.entry,
        bp,
        stash,
    });
    Ok(())
}

fn pad_args(args: &[Value], arity: usize) -> ArgBuf {
    let mut padded: ArgBuf = args.iter().cloned().collect();
    padded.truncate(arity);
    padded.resize(arity, Value::Null);
    padded
}

/// Executes `Return`: pops the active frame, discards its stack slots
/// for a stashless frame, and pushes its result value back for the
/// caller (or, if this was the outermost call, for `run_until`'s caller
/// to collect).
pub(super) fn do_return<C: Cancellation, T: VmTracer>(vm: &mut Vm<C, T>) {
    let result = vm.pop();
    let frame = vm.frames.pop().expect("Return always has an active frame");
    if frame.stash.is_none() {
        vm.stack.truncate(frame.bp);
    }
    vm.tracer.on_return(TraceEvent::Return { depth: vm.frames.len() });
    vm.push(result);
}

/// Calls a function value without going through `dispatch_call`'s
/// bytecode-driven `Call` opcode, used by `Runtime::call` and any
/// native builtin that invokes a callback via `Invoker`. Runs a nested
/// dispatch loop for compiled functions, bounded to unwind back to the
/// call stack depth it started at, so any program already mid-`run` is
/// left undisturbed.
pub fn invoke<C: Cancellation, T: VmTracer>(
    vm: &mut Vm<C, T>,
    func: &Function,
    args: &[Value],
    globals: &dyn GlobalLookup,
) -> Result<Value, RuntimeError> {
    match func {
        Function::Native(native) => (native.func)(args, &mut VmInvoker { vm, globals }),
        Function::Compiled(compiled) => {
            let depth_before = vm.frames.len();
            push_compiled_frame(vm, compiled, args)?;
            vm.run_until(depth_before, globals)
        }
    }
}

struct VmInvoker<'a, C: Cancellation, T: VmTracer> {
    vm: &'a mut Vm<C, T>,
    globals: &'a dyn GlobalLookup,
}

impl<C: Cancellation, T: VmTracer> Invoker for VmInvoker<'_, C, T> {
    fn call(&mut self, func: &Function, args: &[Value]) -> Result<Value, RuntimeError> {
        invoke(self.vm, func, args, self.globals)
    }
}
