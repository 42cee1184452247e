//! The runtime façade: the one object a host holds. Ties the compiler
//! and VM together, owns the globals table, and is the surface a host
//! embeds against instead of reaching into `bytecode`/`vm` directly.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::{CompileError, Compiler, Program};
use crate::error::{CompileFailure, Diagnostic, GscriptError, RuntimeError, SyntaxError};
use crate::parser::Parser;
use crate::pos::FileSet;
use crate::resource::{Cancellation, NoCancellation};
use crate::tracer::{NoopTracer, VmTracer};
use crate::value::{Function, MapKey, Value};
use crate::vm::{GlobalLookup, Vm};

/// The host-writable table backing every free identifier a script
/// doesn't bind itself. Pre-populated with the §4.6 built-ins on
/// construction; a host adds its own entries with [`Globals::set`]
/// before or after a run, but must not mutate it while a program
/// compiled against it is executing (see the crate's concurrency
/// notes).
#[derive(Default)]
pub struct Globals(HashMap<String, Value>);

impl Globals {
    pub fn new() -> Self {
        let mut globals = Globals::default();
        crate::builtins::install(&mut globals);
        globals
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }

    /// Used by `builtins::install` to register entries without going
    /// through the `impl Into<String>` convenience wrapper.
    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.0.insert(name, value);
    }
}

impl GlobalLookup for Globals {
    fn get(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

/// Ties the compiler and VM together for a host embedding this
/// language. `C` and `T` let a host opt into cooperative cancellation
/// and/or instruction tracing without paying for either when unused
/// (the default type parameters compile down to zero-cost no-ops).
pub struct Runtime<C: Cancellation = NoCancellation, T: VmTracer = NoopTracer> {
    vm: Vm<C, T>,
    globals: Globals,
    files: FileSet,
}

impl Default for Runtime<NoCancellation, NoopTracer> {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime<NoCancellation, NoopTracer> {
    /// A runtime with no cancellation support and no tracing, the
    /// common case for a host that just wants to evaluate scripts.
    pub fn new() -> Self {
        Runtime {
            vm: Vm::default(),
            globals: Globals::new(),
            files: FileSet::new(),
        }
    }
}

impl<C: Cancellation, T: VmTracer> Runtime<C, T> {
    /// Builds a runtime with a specific cancellation source and tracer,
    /// e.g. an [`crate::resource::AtomicCancellation`] shared with a
    /// host timer thread, or a [`crate::tracer::StderrTracer`] for
    /// debugging.
    pub fn with_parts(cancellation: C, tracer: T) -> Self {
        Runtime {
            vm: Vm::new(cancellation, tracer),
            globals: Globals::new(),
            files: FileSet::new(),
        }
    }

    pub fn with_max_recursion_depth(self, depth: usize) -> Self {
        Runtime {
            vm: self.vm.with_max_depth(depth),
            globals: self.globals,
            files: self.files,
        }
    }

    /// Compiles `source` into a `Program`, reusing this runtime's
    /// `FileSet` so diagnostics across repeated compiles on the same
    /// runtime keep resolving to valid positions for the program's
    /// whole lifetime.
    pub fn compile(&mut self, source: &str) -> Result<Rc<Program>, GscriptError> {
        self.compile_named("<script>", source)
    }

    pub fn compile_named(&mut self, filename: &str, source: &str) -> Result<Rc<Program>, GscriptError> {
        let mut parser = Parser::new(&mut self.files, filename, source);
        let ast = parser.parse_program();
        if !parser.errors().is_empty() {
            let diagnostics = parser
                .errors()
                .iter()
                .map(|e| Diagnostic {
                    location: self.files.resolve(e.pos),
                    message: e.message.clone(),
                })
                .collect();
            return Err(GscriptError::Syntax(SyntaxError { diagnostics }));
        }

        let compiler = Compiler::new(&self.files);
        match compiler.compile(&ast) {
            Ok(program) => Ok(program),
            Err(errors) => Err(GscriptError::Compile(CompileFailure {
                diagnostics: errors.iter().map(|e: &CompileError| self.resolve_compile_error(e)).collect(),
            })),
        }
    }

    fn resolve_compile_error(&self, e: &CompileError) -> Diagnostic {
        Diagnostic {
            location: self.files.resolve(e.pos),
            message: e.message.clone(),
        }
    }

    /// Runs an already-compiled program to completion.
    pub fn run_program(&mut self, program: &Rc<Program>) -> Result<Value, RuntimeError> {
        self.vm.run(Rc::clone(program), &self.globals)
    }

    /// Compiles and runs `source` in one step.
    pub fn run_string(&mut self, source: &str) -> Result<Value, GscriptError> {
        let program = self.compile(source)?;
        Ok(self.run_program(&program)?)
    }

    /// Invokes a function value from host code, reusing this runtime's
    /// VM. This is how native built-ins (`map`/`filter`/`reduce`/…) call
    /// back into user closures, and how a host can drive a script
    /// callback it was handed.
    pub fn call(&mut self, func: &Function, args: &[Value]) -> Result<Value, RuntimeError> {
        self.vm.call_function(func, args, &self.globals)
    }

    pub fn global(&mut self) -> &mut Globals {
        &mut self.globals
    }

    pub fn global_ref(&self) -> &Globals {
        &self.globals
    }

    pub fn context(&self) -> &C {
        self.vm.cancellation()
    }

    /// Wraps a host value into the dynamic `Value` model. Thin by
    /// design: the host-bridging concern this wraps is out of scope for
    /// the language core (see the crate's design notes), so this only
    /// covers the primitive and collection shapes the value model
    /// already has a native representation for.
    pub fn to_value<V: ToValue>(&self, value: V) -> Value {
        value.to_value()
    }
}

/// Total conversion from common host types into the script `Value`
/// model, backing [`Runtime::to_value`].
pub trait ToValue {
    fn to_value(self) -> Value;
}

impl ToValue for Value {
    fn to_value(self) -> Value {
        self
    }
}

macro_rules! impl_to_value_int {
    ($($t:ty),*) => {
        $(impl ToValue for $t {
            fn to_value(self) -> Value {
                Value::Int(i64::from(self))
            }
        })*
    };
}
impl_to_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for bool {
    fn to_value(self) -> Value {
        Value::Bool(self)
    }
}

impl ToValue for f32 {
    fn to_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl ToValue for f64 {
    fn to_value(self) -> Value {
        Value::Float(self)
    }
}

impl ToValue for String {
    fn to_value(self) -> Value {
        Value::string(self)
    }
}

impl ToValue for &str {
    fn to_value(self) -> Value {
        Value::string(self)
    }
}

impl<V: ToValue> ToValue for Vec<V> {
    fn to_value(self) -> Value {
        Value::array(self.into_iter().map(ToValue::to_value).collect())
    }
}

impl<V: ToValue> ToValue for Option<V> {
    fn to_value(self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<V: ToValue> ToValue for HashMap<String, V> {
    fn to_value(self) -> Value {
        let mut entries: IndexMap<MapKey, Value, ahash::RandomState> = IndexMap::default();
        for (k, v) in self {
            entries.insert(MapKey(k.into()), v.to_value());
        }
        Value::map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_runs_arithmetic() {
        let mut rt = Runtime::new();
        let value = rt.run_string("4 + 5 * 6").unwrap();
        assert_eq!(value.to_int(), 34);
    }

    #[test]
    fn host_global_is_visible_to_scripts() {
        let mut rt = Runtime::new();
        rt.global().set("answer", Value::Int(42));
        let value = rt.run_string("answer").unwrap();
        assert_eq!(value.to_int(), 42);
    }

    #[test]
    fn syntax_errors_surface_with_positions() {
        let mut rt = Runtime::new();
        let err = rt.run_string("let = ;").unwrap_err();
        match err {
            GscriptError::Syntax(_) | GscriptError::Compile(_) => {}
            other => panic!("expected a syntax/compile error, got {other:?}"),
        }
    }

    #[test]
    fn compile_error_on_assignment_to_non_lvalue() {
        let mut rt = Runtime::new();
        let err = rt.compile("1 + 1 = 2;").unwrap_err();
        assert!(matches!(err, GscriptError::Syntax(_)));
    }

    #[test]
    fn call_invokes_a_script_closure_from_the_host() {
        let mut rt = Runtime::new();
        let program = rt.compile("function(a, b) { return a + b; }").unwrap();
        let f = rt.run_program(&program).unwrap();
        let func = f.to_function();
        let result = rt.call(&func, &[Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(result.to_int(), 3);
    }

    #[test]
    fn to_value_wraps_host_collections() {
        let rt = Runtime::new();
        let v = rt.to_value(vec![1i64, 2, 3]);
        assert_eq!(v.to_display_string(), "1,2,3");
    }
}
