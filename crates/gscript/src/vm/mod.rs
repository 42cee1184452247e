//! The stack-based virtual machine.
//!
//! A VM owns one operand stack shared by every call frame and a call
//! stack of [`Frame`]s. Locals live either directly on the operand
//! stack, at a fixed offset from the owning frame's base pointer (the
//! common case), or in a heap-allocated [`Stash`] when the compiler
//! determined the function's scope is captured by a nested closure (see
//! `bytecode::compiler`). Execution is driven entirely by `Opcode`
//! dispatch in [`Vm::run`]; there is no separate "interpreter loop" per
//! instruction kind — binary/compare/call/collection handling is split
//! into sibling modules purely for file-size hygiene.

mod attr;
mod binary;
mod call;
mod collections;
mod compare;

use std::rc::Rc;

use crate::bytecode::{Opcode, Program};
use crate::error::RuntimeError;
use crate::resource::{Cancellation, NoCancellation, DEFAULT_MAX_RECURSION_DEPTH};
use crate::stash::Stash;
use crate::tracer::{NoopTracer, TraceEvent, VmTracer};
use crate::value::Value;

/// One active call: the program it's executing (every frame shares the
/// same program today, since there is no module system, but the field
/// stays per-frame so a future multi-program host embedding isn't
/// precluded), its return address, base pointer into the operand stack,
/// and its stash if the compiler decided it needs one.
struct Frame {
    program: Rc<Program>,
    ip: u32,
    bp: usize,
    stash: Option<Rc<Stash>>,
}

/// Looks up names not found in any lexical scope, i.e. everything the
/// host exposes to scripts: built-in functions and host globals.
pub trait GlobalLookup {
    fn get(&self, name: &str) -> Option<Value>;
}

pub struct Vm<C: Cancellation = NoCancellation, T: VmTracer = NoopTracer> {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    max_depth: usize,
    cancellation: C,
    tracer: T,
}

impl Default for Vm<NoCancellation, NoopTracer> {
    fn default() -> Self {
        Self::new(NoCancellation, NoopTracer)
    }
}

impl<C: Cancellation, T: VmTracer> Vm<C, T> {
    pub fn new(cancellation: C, tracer: T) -> Self {
        Vm {
            stack: Vec::new(),
            frames: Vec::new(),
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
            cancellation,
            tracer,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn cancellation(&self) -> &C {
        &self.cancellation
    }

    /// Runs `program` from its first instruction to completion (a
    /// top-level `Halt`), with `globals` backing any name not bound in a
    /// lexical scope, and returns the final value left on the stack (or
    /// `Null` if the program popped everything).
    pub fn run(&mut self, program: Rc<Program>, globals: &dyn GlobalLookup) -> Result<Value, RuntimeError> {
        let frame_size = program.frame_size;
        self.stack.clear();
        self.frames.clear();
        self.stack.resize(frame_size, Value::Null);
        self.frames.push(Frame {
            program,
            ip: 0,
            bp: 0,
            stash: None,
        });
        self.run_until(0, globals)
    }

    /// Calls a function value directly (used by `Runtime::call` and by
    /// higher-order builtins like `map`/`reduce`), returning its result
    /// without disturbing any program currently mid-`run`.
    pub fn call_function(
        &mut self,
        func: &crate::value::Function,
        args: &[Value],
        globals: &dyn GlobalLookup,
    ) -> Result<Value, RuntimeError> {
        call::invoke(self, func, args, globals)
    }

    fn current(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("dispatch always has an active frame")
    }

    fn fetch(&mut self) -> Opcode {
        let frame = self.current();
        let op = frame.program.instructions[frame.ip as usize];
        frame.ip += 1;
        op
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("compiler balances stack effects")
    }

    /// Dispatches instructions until the call stack unwinds back down to
    /// exactly `target_depth` frames (via `Return`) or the program halts
    /// (`Halt`, only ever reachable from the outermost frame), returning
    /// the value the finishing frame left behind.
    fn run_until(&mut self, target_depth: usize, globals: &dyn GlobalLookup) -> Result<Value, RuntimeError> {
        loop {
            if self.cancellation.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }

            let frame_ip = self.current().ip;
            let op = self.fetch();
            self.tracer.on_instruction(TraceEvent::Instruction {
                ip: frame_ip,
                opcode: &op,
                stack_depth: self.stack.len(),
            });

            match op {
                Opcode::LoadConst(idx) => {
                    let value = self.current().program.consts[idx as usize].clone();
                    self.push(value);
                }
                Opcode::Pop => {
                    self.pop();
                }
                Opcode::Dup => {
                    let top = self.stack.last().expect("Dup requires a value").clone();
                    self.push(top);
                }
                Opcode::LoadStack(slot) => {
                    let bp = self.current().bp;
                    let value = self.stack[bp + slot as usize].clone();
                    self.push(value);
                }
                Opcode::StoreStack(slot) => {
                    let value = self.pop();
                    let bp = self.current().bp;
                    self.stack[bp + slot as usize] = value;
                }
                Opcode::LoadStash(level, slot) => {
                    let stash = self.current().stash.clone().expect("compiler guarantees a stash exists");
                    self.push(stash.load(level, slot as usize));
                }
                Opcode::StoreStash(level, slot) => {
                    let value = self.pop();
                    let stash = self.current().stash.clone().expect("compiler guarantees a stash exists");
                    stash.store(level, slot as usize, value);
                }
                Opcode::LoadGlobal(idx) => {
                    let name = self.current().program.name(idx).to_string();
                    self.push(globals.get(&name).unwrap_or(Value::Null));
                }
                Opcode::Jump(target) => {
                    self.current().ip = target;
                }
                Opcode::JumpIfFalse(target) => {
                    if !self.pop().to_bool() {
                        self.current().ip = target;
                    }
                }
                Opcode::JumpIfTrue(target) => {
                    if self.pop().to_bool() {
                        self.current().ip = target;
                    }
                }
                Opcode::Neg => {
                    let value = self.pop();
                    self.push(binary::neg(&value)?);
                }
                Opcode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(!value.to_bool()));
                }
                Opcode::Add => self.binary_op(binary::add)?,
                Opcode::Sub => self.binary_op(binary::sub)?,
                Opcode::Mul => self.binary_op(binary::mul)?,
                Opcode::Div => self.binary_op(binary::div)?,
                Opcode::Rem => self.binary_op(binary::rem)?,
                Opcode::Xor => self.binary_op(binary::xor)?,
                Opcode::Shl => self.binary_op(binary::shl)?,
                Opcode::Shr => self.binary_op(binary::shr)?,
                Opcode::Eq => {
                    let (a, b) = self.pop_pair();
                    self.push(Value::Bool(a.equals(&b)));
                }
                Opcode::NotEq => {
                    let (a, b) = self.pop_pair();
                    self.push(Value::Bool(!a.equals(&b)));
                }
                Opcode::Lt => {
                    let (a, b) = self.pop_pair();
                    self.push(Value::Bool(matches!(compare::order(&a, &b), Some(o) if o.is_lt())));
                }
                Opcode::Gt => {
                    let (a, b) = self.pop_pair();
                    self.push(Value::Bool(matches!(compare::order(&a, &b), Some(o) if o.is_gt())));
                }
                Opcode::Le => {
                    let (a, b) = self.pop_pair();
                    self.push(Value::Bool(matches!(compare::order(&a, &b), Some(o) if o.is_le())));
                }
                Opcode::Ge => {
                    let (a, b) = self.pop_pair();
                    self.push(Value::Bool(matches!(compare::order(&a, &b), Some(o) if o.is_ge())));
                }
                Opcode::NewArray => self.push(Value::array(Vec::new())),
                Opcode::ArrayPush => {
                    let value = self.pop();
                    collections::array_push(self.stack.last().expect("array receiver"), value);
                }
                Opcode::ArrayExtend => {
                    let value = self.pop();
                    collections::array_extend(self.stack.last().expect("array receiver"), &value)?;
                }
                Opcode::NewMap => self.push(Value::empty_map()),
                Opcode::MapInsert => {
                    let value = self.pop();
                    let key = self.pop();
                    collections::map_insert(self.stack.last().expect("map receiver"), &key, value);
                }
                Opcode::MapExtend => {
                    let value = self.pop();
                    collections::map_extend(self.stack.last().expect("map receiver"), &value)?;
                }
                Opcode::GetIndex => {
                    let index = self.pop();
                    let target = self.pop();
                    self.push(collections::get_index(&target, &index));
                }
                Opcode::SetIndex => {
                    let value = self.pop();
                    let index = self.pop();
                    let target = self.pop();
                    collections::set_index(&target, &index, value);
                }
                Opcode::GetAttr(idx) => {
                    let name = self.current().program.name(idx).to_string();
                    let target = self.pop();
                    self.push(attr::get_attr(&target, &name));
                }
                Opcode::SetAttr(idx) => {
                    let name = self.current().program.name(idx).to_string();
                    let value = self.pop();
                    let target = self.pop();
                    attr::set_attr(&target, &name, value);
                }
                Opcode::MakeFunction(idx) => {
                    let value = call::make_function(self, idx);
                    self.push(value);
                }
                Opcode::Call(argc) => {
                    call::dispatch_call(self, argc, globals)?;
                }
                Opcode::Return => {
                    call::do_return(self);
                    if self.frames.len() == target_depth {
                        return Ok(self.pop());
                    }
                }
                Opcode::Halt => return Ok(self.stack.pop().unwrap_or(Value::Null)),
            }
        }
    }

    fn pop_pair(&mut self) -> (Value, Value) {
        let b = self.pop();
        let a = self.pop();
        (a, b)
    }

    fn binary_op(
        &mut self,
        f: impl FnOnce(&Value, &Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let (a, b) = self.pop_pair();
        self.push(f(&a, &b)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Compiler;
    use crate::parser::Parser;
    use crate::pos::FileSet;
    use std::collections::HashMap;

    struct NoGlobals;
    impl GlobalLookup for NoGlobals {
        fn get(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    struct MapGlobals(HashMap<String, Value>);
    impl GlobalLookup for MapGlobals {
        fn get(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn run(src: &str) -> Value {
        let mut files = FileSet::new();
        let mut parser = Parser::new(&mut files, "test.gs", src);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        let compiler = Compiler::new(&files);
        let program = compiler.compile(&program).unwrap();
        let mut vm = Vm::default();
        vm.run(program, &NoGlobals).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(run("4 + 5 * 6;").to_int(), 34);
    }

    #[test]
    fn division_promotes_to_float() {
        assert_eq!(run("1 / 2;").to_float(), 0.5);
    }

    #[test]
    fn short_circuit_and_or() {
        assert!(!run("false && (1 / 0 == 1);").to_bool());
        assert!(run("true || (1 / 0 == 1);").to_bool());
    }

    #[test]
    fn if_else_selects_branch() {
        assert_eq!(run("let x = 0; if (true) { x = 1; } else { x = 2; } x;").to_int(), 1);
    }

    #[test]
    fn for_loop_accumulates() {
        assert_eq!(run("let sum = 0; for (let i = 0; i < 5; i = i + 1) { sum = sum + i; } sum;").to_int(), 10);
    }

    #[test]
    fn closures_capture_by_reference() {
        assert_eq!(
            run("let counter = function() { let n = 0; return function() { n = n + 1; return n; }; }; let c = counter(); c(); c();").to_int(),
            2
        );
    }

    #[test]
    fn recursive_named_function_expression() {
        let value = run(
            "let fib = function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }; fib(10);",
        );
        assert_eq!(value.to_int(), 55);
    }

    #[test]
    fn array_index_and_length_builtin_not_required_for_basic_index() {
        assert_eq!(run("let xs = [1, 2, 3]; xs[1];").to_int(), 2);
    }

    #[test]
    fn unbounded_recursion_raises_stack_overflow() {
        let mut files = FileSet::new();
        let src = "let f = function f() { return f(); }; f();";
        let mut parser = Parser::new(&mut files, "test.gs", src);
        let program = parser.parse_program();
        let compiler = Compiler::new(&files);
        let program = compiler.compile(&program).unwrap();
        let mut vm = Vm::default().with_max_depth(64);
        let result = vm.run(program, &NoGlobals);
        assert!(matches!(result, Err(RuntimeError::StackOverflow { .. })));
    }

    #[test]
    fn global_lookup_backs_undeclared_names() {
        let mut files = FileSet::new();
        let src = "answer;";
        let mut parser = Parser::new(&mut files, "test.gs", src);
        let program = parser.parse_program();
        let compiler = Compiler::new(&files);
        let program = compiler.compile(&program).unwrap();
        let mut globals = HashMap::new();
        globals.insert("answer".to_string(), Value::Int(42));
        let mut vm = Vm::default();
        let result = vm.run(program, &MapGlobals(globals)).unwrap();
        assert_eq!(result.to_int(), 42);
    }

    #[test]
    fn an_unbound_free_name_degrades_to_null_rather_than_erroring() {
        assert!(matches!(run("mystery;"), Value::Null));
    }
}
