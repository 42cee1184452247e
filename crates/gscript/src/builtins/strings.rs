//! The `strings.*` standard package: a map of native string functions
//! installed as a single global named `strings`, so scripts reach them
//! as `strings.has_prefix(...)` etc. Unlike the curried higher-order
//! built-ins, these take their arguments positionally and in full —
//! there is no point-free composition story for string helpers.

use std::rc::Rc;

use ahash::RandomState;
use indexmap::IndexMap;
use regex::Regex;

use crate::builtins::{arg, native_value};
use crate::error::RuntimeError;
use crate::value::{Invoker, MapKey, Value};

pub(super) fn module() -> Value {
    let mut fields: IndexMap<MapKey, Value, RandomState> = IndexMap::default();
    let mut put = |name: &str, arity: Option<usize>, f: Rc<dyn Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError>>| {
        fields.insert(MapKey(name.into()), native_value(name, arity, f));
    };

    put("has_prefix", Some(2), Rc::new(has_prefix));
    put("has_suffix", Some(2), Rc::new(has_suffix));
    put("to_upper", Some(1), Rc::new(to_upper));
    put("to_lower", Some(1), Rc::new(to_lower));
    put("trim", Some(1), Rc::new(trim));
    put("trim_start", Some(1), Rc::new(trim_start));
    put("trim_end", Some(1), Rc::new(trim_end));
    put("split", Some(2), Rc::new(split));
    put("join", Some(2), Rc::new(join));
    put("contains", Some(2), Rc::new(contains));
    put("index_of", Some(2), Rc::new(index_of));
    put("last_index_of", Some(2), Rc::new(last_index_of));
    put("match", Some(2), Rc::new(matches_fn));
    put("find_all", Some(2), Rc::new(find_all));
    put("repeat", Some(2), Rc::new(repeat));

    Value::map(fields)
}

fn str_arg(args: &[Value], i: usize) -> String {
    arg(args, i).to_display_string()
}

fn has_prefix(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(str_arg(args, 0).starts_with(&str_arg(args, 1))))
}

fn has_suffix(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(str_arg(args, 0).ends_with(&str_arg(args, 1))))
}

fn to_upper(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_arg(args, 0).to_uppercase()))
}

fn to_lower(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_arg(args, 0).to_lowercase()))
}

/// ASCII-space trimming: strips `' ' \t \n \r`, matching the contract's
/// "ASCII-space default" rather than full Unicode whitespace.
fn is_ascii_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn trim(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_arg(args, 0).trim_matches(is_ascii_space)))
}

fn trim_start(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_arg(args, 0).trim_start_matches(is_ascii_space)))
}

fn trim_end(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::string(str_arg(args, 0).trim_end_matches(is_ascii_space)))
}

fn split(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let s = str_arg(args, 0);
    let sep = str_arg(args, 1);
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Value::string).collect()
    };
    Ok(Value::array(parts))
}

fn join(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let parts = arg(args, 0);
    let sep = str_arg(args, 1);
    let Some(iter) = parts.iter() else {
        return Ok(Value::string(""));
    };
    let rendered: Vec<String> = iter.map(|(_, v)| v.to_display_string()).collect();
    Ok(Value::string(rendered.join(&sep)))
}

fn contains(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(str_arg(args, 0).contains(&str_arg(args, 1))))
}

fn index_of(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let haystack = str_arg(args, 0);
    let needle = str_arg(args, 1);
    match haystack.find(&needle) {
        Some(byte_idx) => Ok(Value::Int(haystack[..byte_idx].chars().count() as i64)),
        None => Ok(Value::Int(-1)),
    }
}

fn last_index_of(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let haystack = str_arg(args, 0);
    let needle = str_arg(args, 1);
    match haystack.rfind(&needle) {
        Some(byte_idx) => Ok(Value::Int(haystack[..byte_idx].chars().count() as i64)),
        None => Ok(Value::Int(-1)),
    }
}

/// `strings.match(s, pattern)`: whether the regex `pattern` matches
/// anywhere in `s`. An invalid pattern degrades to `false` rather than
/// raising, matching this language's silent-coercion policy elsewhere.
fn matches_fn(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let s = str_arg(args, 0);
    let pattern = str_arg(args, 1);
    let found = Regex::new(&pattern).is_ok_and(|re| re.is_match(&s));
    Ok(Value::Bool(found))
}

/// `strings.find_all(s, pattern)`: every non-overlapping regex match in
/// `s`, in order. An invalid pattern degrades to an empty array.
fn find_all(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let s = str_arg(args, 0);
    let pattern = str_arg(args, 1);
    let Ok(re) = Regex::new(&pattern) else {
        return Ok(Value::array(Vec::new()));
    };
    let found: Vec<Value> = re.find_iter(&s).map(|m| Value::string(m.as_str())).collect();
    Ok(Value::array(found))
}

/// `strings.repeat(s, n)`: `s` concatenated with itself `n` times.
/// Negative `n` degrades to the empty string; a repeat count whose
/// total length would overflow `usize` likewise degrades to the empty
/// string rather than aborting the process.
fn repeat(args: &[Value], _: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let s = str_arg(args, 0);
    let n = arg(args, 1).to_int();
    if n <= 0 {
        return Ok(Value::string(""));
    }
    match s.len().checked_mul(n as usize) {
        Some(_) => Ok(Value::string(s.repeat(n as usize))),
        None => Ok(Value::string("")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoInvoker;
    impl Invoker for NoInvoker {
        fn call(&mut self, _func: &crate::value::Function, _args: &[Value]) -> Result<Value, RuntimeError> {
            unreachable!("strings.* functions never call back into scripts")
        }
    }

    fn call(name: &str, args: &[Value]) -> Value {
        let Value::Map(data) = module() else { panic!("module() returns a map") };
        let data = data.borrow();
        let f = data.get(&MapKey(name.into())).unwrap().to_function();
        let crate::value::Function::Native(native) = f else { panic!("expected native function") };
        (native.func)(args, &mut NoInvoker).unwrap()
    }

    #[test]
    fn has_prefix_and_suffix() {
        assert!(call("has_prefix", &[Value::string("hello"), Value::string("he")]).to_bool());
        assert!(!call("has_suffix", &[Value::string("hello"), Value::string("lx")]).to_bool());
    }

    #[test]
    fn case_folding() {
        assert_eq!(call("to_upper", &[Value::string("Hi")]).to_display_string(), "HI");
        assert_eq!(call("to_lower", &[Value::string("Hi")]).to_display_string(), "hi");
    }

    #[test]
    fn trim_strips_ascii_space_by_default() {
        assert_eq!(call("trim", &[Value::string("  hi\n")]).to_display_string(), "hi");
    }

    #[test]
    fn split_and_join_round_trip() {
        let parts = call("split", &[Value::string("a,b,c"), Value::string(",")]);
        assert_eq!(parts.to_display_string(), "a,b,c");
        let joined = call("join", &[parts, Value::string("-")]);
        assert_eq!(joined.to_display_string(), "a-b-c");
    }

    #[test]
    fn index_of_counts_unicode_scalars_not_bytes() {
        assert_eq!(call("index_of", &[Value::string("héllo"), Value::string("llo")]).to_int(), 2);
        assert_eq!(call("index_of", &[Value::string("abc"), Value::string("z")]).to_int(), -1);
    }

    #[test]
    fn find_all_collects_every_match() {
        let result = call("find_all", &[Value::string("a1 b22 c333"), Value::string(r"\d+")]);
        assert_eq!(result.to_display_string(), "1,22,333");
    }

    #[test]
    fn repeat_concatenates_n_times() {
        assert_eq!(call("repeat", &[Value::string("ab"), Value::Int(3)]).to_display_string(), "ababab");
        assert_eq!(call("repeat", &[Value::string("ab"), Value::Int(-1)]).to_display_string(), "");
    }
}
