//! `curry`, `map`, `filter`, `reduce`, `find`, `find_index`, `find_last`,
//! `find_last_index` — the §4.6 higher-order built-ins. Every iterator
//! here except `curry` itself is installed already curried (callback
//! first, the indexable "base" argument last), so they compose with the
//! pipe operator: `xs | map(double) | filter(positive)`.
//!
//! All of them walk their base argument through [`Value::iter`], which
//! already implements the Iterable contract (arrays front-to-back, maps
//! in sorted key order, skipping keys deleted mid-iteration), so none of
//! this module re-derives indexing or length. The callback always
//! receives the current key/index as a trailing argument after the
//! element (`acc, value, key, base` for `reduce`); `find_index`/
//! `find_last_index` return `-1`, not `null`, when nothing matches.

use std::rc::Rc;

use crate::builtins::{arg, native_value};
use crate::error::RuntimeError;
use crate::value::{Invoker, NativeFn, Value};

type Entry = (&'static str, Option<usize>, NativeFn);

pub(super) fn entries() -> Vec<Entry> {
    vec![
        ("curry", Some(2), Rc::new(curry)),
        ("map", Some(2), Rc::new(curried(2, map_body))),
        ("filter", Some(2), Rc::new(curried(2, filter_body))),
        ("reduce", Some(3), Rc::new(curried(3, reduce_body))),
        ("find", Some(2), Rc::new(curried(2, find_body))),
        ("find_index", Some(2), Rc::new(curried(2, find_index_body))),
        ("find_last", Some(2), Rc::new(curried(2, find_last_body))),
        ("find_last_index", Some(2), Rc::new(curried(2, find_last_index_body))),
    ]
}

fn curry(args: &[Value], _invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let arity = arg(args, 0).to_int().max(0) as usize;
    let func = arg(args, 1).to_function();
    Ok(build_curried_function(
        arity,
        Rc::new(move |args, invoker: &mut dyn Invoker| invoker.call(&func, args)),
        Vec::new(),
    ))
}

/// Wraps a native body so it is callable only once `arity` arguments
/// have accumulated across however many partial calls it takes to
/// collect them; any call short of `arity` returns a new native
/// function closing over the arguments seen so far.
fn curried(
    arity: usize,
    body: impl Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError> + 'static,
) -> impl Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError> + 'static {
    let body: Rc<dyn Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError>> = Rc::new(body);
    move |args: &[Value], invoker: &mut dyn Invoker| {
        let value = build_curried_function(arity, body.clone(), Vec::new());
        call_value(&value, args, invoker)
    }
}

fn call_value(value: &Value, args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    invoker.call(&value.to_function(), args)
}

fn build_curried_function(
    arity: usize,
    f: Rc<dyn Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError>>,
    collected: Vec<Value>,
) -> Value {
    native_value(
        "<curried>",
        None,
        Rc::new(move |args, invoker| {
            let mut next = collected.clone();
            next.extend_from_slice(args);
            if next.len() >= arity {
                f(&next, invoker)
            } else {
                Ok(build_curried_function(arity, f.clone(), next))
            }
        }),
    )
}

fn map_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let base = arg(args, 1);
    let Some(iter) = base.iter() else {
        return Ok(Value::array(Vec::new()));
    };
    let mut out = Vec::new();
    for (key, value) in iter {
        out.push(invoker.call(&f, &[value, key])?);
    }
    Ok(Value::array(out))
}

fn filter_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let base = arg(args, 1);
    let Some(iter) = base.iter() else {
        return Ok(Value::array(Vec::new()));
    };
    let mut out = Vec::new();
    for (key, value) in iter {
        if invoker.call(&f, &[value.clone(), key])?.to_bool() {
            out.push(value);
        }
    }
    Ok(Value::array(out))
}

fn reduce_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let mut acc = arg(args, 1);
    let base = arg(args, 2);
    let Some(iter) = base.iter() else {
        return Ok(acc);
    };
    for (key, value) in iter {
        acc = invoker.call(&f, &[acc, value, key, base.clone()])?;
    }
    Ok(acc)
}

fn find_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let base = arg(args, 1);
    let Some(iter) = base.iter() else {
        return Ok(Value::Null);
    };
    for (key, value) in iter {
        if invoker.call(&f, &[value.clone(), key])?.to_bool() {
            return Ok(value);
        }
    }
    Ok(Value::Null)
}

fn find_index_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let base = arg(args, 1);
    let Some(iter) = base.iter() else {
        return Ok(Value::Int(-1));
    };
    for (key, value) in iter {
        if invoker.call(&f, &[value, key.clone()])?.to_bool() {
            return Ok(key);
        }
    }
    Ok(Value::Int(-1))
}

fn find_last_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let base = arg(args, 1);
    let Some(iter) = base.iter() else {
        return Ok(Value::Null);
    };
    let mut last = Value::Null;
    for (key, value) in iter {
        if invoker.call(&f, &[value.clone(), key])?.to_bool() {
            last = value;
        }
    }
    Ok(last)
}

fn find_last_index_body(args: &[Value], invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let f = arg(args, 0).to_function();
    let base = arg(args, 1);
    let Some(iter) = base.iter() else {
        return Ok(Value::Int(-1));
    };
    let mut last = Value::Int(-1);
    for (key, value) in iter {
        if invoker.call(&f, &[value, key.clone()])?.to_bool() {
            last = key;
        }
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoInvoker;
    impl Invoker for EchoInvoker {
        fn call(&mut self, func: &crate::value::Function, args: &[Value]) -> Result<Value, RuntimeError> {
            match func {
                crate::value::Function::Native(f) => (f.func)(args, self),
                crate::value::Function::Compiled(_) => unreachable!("tests only exercise native callbacks"),
            }
        }
    }

    fn native(f: impl Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError> + 'static) -> Value {
        native_value("f", None, Rc::new(f))
    }

    fn is_even() -> Value {
        native(|args, _| Ok(Value::Bool(arg(args, 0).to_int() % 2 == 0)))
    }

    fn double() -> Value {
        native(|args, _| Ok(Value::Int(arg(args, 0).to_int() * 2)))
    }

    #[test]
    fn curry_collects_arguments_across_calls() {
        let add3 = native(|args, _| Ok(Value::Int(arg(args, 0).to_int() + arg(args, 1).to_int() + arg(args, 2).to_int())));
        let mut invoker = EchoInvoker;
        let curried = curry(&[Value::Int(3), add3], &mut invoker).unwrap();
        let partial = invoker.call(&curried.to_function(), &[Value::Int(1)]).unwrap();
        let partial2 = invoker.call(&partial.to_function(), &[Value::Int(2)]).unwrap();
        let result = invoker.call(&partial2.to_function(), &[Value::Int(3)]).unwrap();
        assert_eq!(result.to_int(), 6);
    }

    #[test]
    fn map_applies_function_to_each_element() {
        let xs = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let mut invoker = EchoInvoker;
        let result = map_body(&[double(), xs], &mut invoker).unwrap();
        assert_eq!(result.to_display_string(), "2,4,6");
    }

    #[test]
    fn filter_keeps_matching_elements() {
        let xs = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        let mut invoker = EchoInvoker;
        let result = filter_body(&[is_even(), xs], &mut invoker).unwrap();
        assert_eq!(result.to_display_string(), "2,4");
    }

    #[test]
    fn reduce_folds_from_the_left() {
        let add = native(|args, _| Ok(Value::Int(arg(args, 0).to_int() + arg(args, 1).to_int())));
        let xs = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let mut invoker = EchoInvoker;
        let result = reduce_body(&[add, Value::Int(0), xs], &mut invoker).unwrap();
        assert_eq!(result.to_int(), 6);
    }

    #[test]
    fn find_returns_first_match_or_null() {
        let xs = Value::array(vec![Value::Int(1), Value::Int(3), Value::Int(4), Value::Int(6)]);
        let mut invoker = EchoInvoker;
        assert_eq!(find_body(&[is_even(), xs.clone()], &mut invoker).unwrap().to_int(), 4);

        let odds = Value::array(vec![Value::Int(1), Value::Int(3)]);
        assert!(matches!(find_body(&[is_even(), odds], &mut invoker).unwrap(), Value::Null));
    }

    #[test]
    fn find_last_index_returns_the_last_matching_key() {
        let xs = Value::array(vec![Value::Int(2), Value::Int(3), Value::Int(4), Value::Int(5)]);
        let mut invoker = EchoInvoker;
        let result = find_last_index_body(&[is_even(), xs], &mut invoker).unwrap();
        assert_eq!(result.to_int(), 2);
    }

    #[test]
    fn find_index_and_find_last_index_return_negative_one_on_no_match() {
        let xs = Value::array(vec![Value::Int(1), Value::Int(3)]);
        let mut invoker = EchoInvoker;
        assert_eq!(find_index_body(&[is_even(), xs.clone()], &mut invoker).unwrap().to_int(), -1);
        assert_eq!(find_last_index_body(&[is_even(), xs], &mut invoker).unwrap().to_int(), -1);
    }

    #[test]
    fn map_and_reduce_callbacks_receive_the_index() {
        let xs = Value::array(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
        let mut invoker = EchoInvoker;
        let index_only = native(|args, _| Ok(Value::Int(arg(args, 1).to_int())));
        let result = map_body(&[index_only, xs.clone()], &mut invoker).unwrap();
        assert_eq!(result.to_display_string(), "0,1,2");

        let sum_indices = native(|args, _| Ok(Value::Int(arg(args, 0).to_int() + arg(args, 2).to_int())));
        let result = reduce_body(&[sum_indices, Value::Int(0), xs], &mut invoker).unwrap();
        assert_eq!(result.to_int(), 3);
    }
}
