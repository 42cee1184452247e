//! The error taxonomy surfaced to hosts: distinct syntax, compile, and
//! runtime error types, each carrying a resolved position where one is
//! available. None of these are script-visible values — this language
//! has no exception mechanism, so a runtime error always unwinds the
//! whole `run`/`call` invocation back to the host.

use std::fmt;

use crate::pos::Location;

/// One diagnostic produced while scanning or parsing, already resolved
/// to a human-readable location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Scanning or parsing failed. Carries every diagnostic collected in the
/// pass (up to the scanner/parser's 10-distinct-lines budget), not just
/// the first, so a host can report them all at once.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SyntaxError {}

/// A structurally invalid program that parsed but cannot be compiled
/// (e.g. assignment to a non-lvalue).
#[derive(Debug, Clone, PartialEq)]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileFailure {}

/// An error raised while a compiled program was executing.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// The call stack exceeded the VM's configured recursion limit.
    StackOverflow { depth: usize },
    /// The host's cancellation handle tripped mid-execution.
    Cancelled,
    /// A type error raised by an operator or builtin (e.g. calling a
    /// non-function, indexing a non-container).
    Type(String),
    /// An out-of-range index or missing map key used where the
    /// operation requires the target to exist.
    Range(String),
    /// An error surfaced by a host-supplied native function.
    Native(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackOverflow { depth } => write!(f, "stack overflow: call depth exceeded {depth}"),
            RuntimeError::Cancelled => write!(f, "execution was cancelled"),
            RuntimeError::Type(msg) => write!(f, "type error: {msg}"),
            RuntimeError::Range(msg) => write!(f, "range error: {msg}"),
            RuntimeError::Native(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// The union of every error a `Runtime` method can return, letting a
/// host handle "any failure" uniformly with `?` while still being able
/// to match on the specific stage that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum GscriptError {
    Syntax(SyntaxError),
    Compile(CompileFailure),
    Runtime(RuntimeError),
}

impl fmt::Display for GscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GscriptError::Syntax(e) => write!(f, "{e}"),
            GscriptError::Compile(e) => write!(f, "{e}"),
            GscriptError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GscriptError {}

impl From<SyntaxError> for GscriptError {
    fn from(e: SyntaxError) -> Self {
        GscriptError::Syntax(e)
    }
}

impl From<CompileFailure> for GscriptError {
    fn from(e: CompileFailure) -> Self {
        GscriptError::Compile(e)
    }
}

impl From<RuntimeError> for GscriptError {
    fn from(e: RuntimeError) -> Self {
        GscriptError::Runtime(e)
    }
}
