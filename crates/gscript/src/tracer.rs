//! Opt-in VM instrumentation.
//!
//! `VmTracer` is a VM type parameter rather than a boxed trait object: a
//! host that never traces gets [`NoopTracer`], whose methods inline away
//! entirely under monomorphization, so tracing costs nothing when it
//! isn't used. [`StderrTracer`] is the one concrete implementation this
//! crate ships, for ad hoc debugging of the compiler/VM themselves;
//! hosts that want richer profiling implement their own tracer against
//! the same trait.

use crate::bytecode::Opcode;

/// One observable event during execution.
#[derive(Debug, Clone, Copy)]
pub enum TraceEvent<'a> {
    Instruction { ip: u32, opcode: &'a Opcode, stack_depth: usize },
    Call { name: Option<&'a str>, depth: usize },
    Return { depth: usize },
}

pub trait VmTracer {
    #[allow(unused_variables)]
    fn on_instruction(&mut self, event: TraceEvent<'_>) {}
    #[allow(unused_variables)]
    fn on_call(&mut self, event: TraceEvent<'_>) {}
    #[allow(unused_variables)]
    fn on_return(&mut self, event: TraceEvent<'_>) {}
}

/// The default tracer: every hook is a no-op, and with no fields to
/// store, the compiler elides it entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Prints a line per instruction (and call/return) to stderr. Intended
/// for interactively debugging the compiler or VM, not for production
/// use — it is not rate-limited beyond the optional `limit`.
#[derive(Debug, Default)]
pub struct StderrTracer {
    limit: Option<usize>,
    count: usize,
}

impl StderrTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        StderrTracer { limit: Some(limit), count: 0 }
    }

    fn allowed(&mut self) -> bool {
        match self.limit {
            Some(limit) if self.count >= limit => false,
            _ => {
                self.count += 1;
                true
            }
        }
    }
}

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, event: TraceEvent<'_>) {
        if !self.allowed() {
            return;
        }
        if let TraceEvent::Instruction { ip, opcode, stack_depth } = event {
            eprintln!("[{ip:>5}] {opcode:?}  stack={stack_depth}");
        }
    }

    fn on_call(&mut self, event: TraceEvent<'_>) {
        if let TraceEvent::Call { name, depth } = event {
            eprintln!("  >>> CALL {:<20} depth={depth}", name.unwrap_or("<anonymous>"));
        }
    }

    fn on_return(&mut self, event: TraceEvent<'_>) {
        if let TraceEvent::Return { depth } = event {
            eprintln!("  <<< RETURN              depth={depth}");
        }
    }
}
