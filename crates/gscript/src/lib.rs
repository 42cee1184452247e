//! `gscript`: an embeddable expression and scripting language.
//!
//! A host compiles a source string into a bytecode [`Program`] via
//! [`Runtime::compile`] and runs it on a stack-based virtual machine to
//! obtain a dynamically typed [`Value`], optionally exposing host-supplied
//! globals and native functions through [`Runtime::global`].
//!
//! ```
//! let mut rt = gscript::Runtime::new();
//! let value = rt.run_string("4 + 5 * 6").unwrap();
//! assert_eq!(value.to_string(), "34");
//! ```

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod error;
pub mod parser;
pub mod pos;
pub mod resource;
mod runtime;
pub mod scanner;
pub mod stash;
pub mod token;
pub mod tracer;
pub mod value;
mod vm;

pub use bytecode::{CompileError, Program};
pub use error::{CompileFailure, Diagnostic, GscriptError, RuntimeError, SyntaxError};
pub use resource::{AtomicCancellation, Cancellation, NoCancellation, DEFAULT_MAX_RECURSION_DEPTH};
pub use runtime::{Globals, Runtime, ToValue};
pub use tracer::{NoopTracer, StderrTracer, TraceEvent, VmTracer};
pub use value::{Function, Value};
