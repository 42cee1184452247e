//! Built-in global functions installed into every fresh [`crate::runtime::Runtime`].
//!
//! Each submodule contributes a handful of `(name, NativeFunction)`
//! pairs; `install` collects them all into the globals table a host's
//! own registrations sit alongside.

mod coerce;
mod higher_order;
mod iter;
mod strings;

use std::rc::Rc;

use crate::value::{Function, NativeFn, NativeFunction, Value};

pub fn install(globals: &mut crate::runtime::Globals) {
    for (name, arity, func) in coerce::entries() {
        register(globals, name, arity, func);
    }
    for (name, arity, func) in higher_order::entries() {
        register(globals, name, arity, func);
    }
    for (name, arity, func) in iter::entries() {
        register(globals, name, arity, func);
    }
    globals.insert("strings".to_string(), strings::module());
}

/// Native functions never raise an arity error (matching the rest of
/// this language's silent-coercion policy); a missing argument simply
/// reads back as `Null`, same as an out-of-range array index would.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn register(globals: &mut crate::runtime::Globals, name: &str, arity: Option<usize>, func: NativeFn) {
    globals.insert(
        name.to_string(),
        Value::Function(Function::Native(Rc::new(NativeFunction {
            name: name.to_string(),
            arity,
            func,
        }))),
    );
}

/// Builds a bare `Value::Function` wrapping a native closure, used by
/// submodules that construct helper functions not installed directly
/// as a top-level global (e.g. the functions `curry` itself returns).
pub(crate) fn native_value(name: impl Into<String>, arity: Option<usize>, func: NativeFn) -> Value {
    Value::Function(Function::Native(Rc::new(NativeFunction {
        name: name.into(),
        arity,
        func,
    })))
}
