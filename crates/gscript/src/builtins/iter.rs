//! `to_entries` and `from_entries` — converters between map-like and
//! array-of-pairs representations, built on the same Iterable contract
//! ([`Value::iter`]) the higher-order built-ins use.

use std::rc::Rc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::builtins::arg;
use crate::error::RuntimeError;
use crate::value::{Invoker, MapKey, NativeFn, Value};

type Entry = (&'static str, Option<usize>, NativeFn);

pub(super) fn entries() -> Vec<Entry> {
    vec![
        ("to_entries", Some(1), Rc::new(to_entries)),
        ("from_entries", Some(1), Rc::new(from_entries)),
    ]
}

/// `to_entries(v)`: walks `v`'s Iterable contract (arrays front-to-back,
/// maps in sorted key order) and produces an array of `{ key, value }`
/// entry maps. Not iterable degrades to an empty array, matching this
/// language's silent-coercion policy.
fn to_entries(args: &[Value], _invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let Some(iter) = arg(args, 0).iter() else {
        return Ok(Value::array(Vec::new()));
    };
    let entries = iter
        .map(|(key, value)| {
            let mut fields: IndexMap<MapKey, Value, RandomState> = IndexMap::default();
            fields.insert(MapKey("key".into()), key);
            fields.insert(MapKey("value".into()), value);
            Value::map(fields)
        })
        .collect();
    Ok(Value::array(entries))
}

/// `from_entries(v)`: the inverse of `to_entries`, accepting either
/// `{ key, value }` entry maps or bare two-element `[key, value]`
/// arrays — a small convenience since both shapes are equally common
/// ways to build the input by hand. Entries matching neither shape are
/// skipped.
fn from_entries(args: &[Value], _invoker: &mut dyn Invoker) -> Result<Value, RuntimeError> {
    let mut out: IndexMap<MapKey, Value, RandomState> = IndexMap::default();
    let Some(iter) = arg(args, 0).iter() else {
        return Ok(Value::map(out));
    };
    for (_, entry) in iter {
        if let Some((key, value)) = entry_key_value(&entry) {
            out.insert(key, value);
        }
    }
    Ok(Value::map(out))
}

fn entry_key_value(entry: &Value) -> Option<(MapKey, Value)> {
    match entry.deref() {
        Value::Map(data) => {
            let data = data.borrow();
            let key = data.get(&MapKey("key".into()))?.clone();
            let value = data.get(&MapKey("value".into())).cloned().unwrap_or(Value::Null);
            Some((MapKey::from_value(&key.deref()), value))
        }
        Value::Array(data) => {
            let data = data.borrow();
            if data.len() < 2 {
                return None;
            }
            Some((MapKey::from_value(&data[0].deref()), data[1].clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoInvoker;
    impl Invoker for NoInvoker {
        fn call(&mut self, _func: &crate::value::Function, _args: &[Value]) -> Result<Value, RuntimeError> {
            unreachable!("to_entries/from_entries never call back into scripts")
        }
    }

    #[test]
    fn to_entries_walks_an_array_with_its_index_as_key() {
        let xs = Value::array(vec![Value::string("a"), Value::string("b")]);
        let result = to_entries(&[xs], &mut NoInvoker).unwrap();
        assert_eq!(result.to_display_string(), "[object Map],[object Map]");
    }

    #[test]
    fn from_entries_accepts_two_element_arrays() {
        let entries = Value::array(vec![
            Value::array(vec![Value::string("a"), Value::Int(1)]),
            Value::array(vec![Value::string("b"), Value::Int(2)]),
        ]);
        let result = from_entries(&[entries], &mut NoInvoker).unwrap();
        let Value::Map(data) = result else { panic!("expected a map") };
        assert_eq!(data.borrow().get(&MapKey("a".into())).unwrap().to_int(), 1);
        assert_eq!(data.borrow().get(&MapKey("b".into())).unwrap().to_int(), 2);
    }

    #[test]
    fn round_trips_a_map_through_to_entries_and_from_entries() {
        let mut fields: IndexMap<MapKey, Value, RandomState> = IndexMap::default();
        fields.insert(MapKey("x".into()), Value::Int(1));
        fields.insert(MapKey("y".into()), Value::Int(2));
        let m = Value::map(fields);
        let entries = to_entries(&[m], &mut NoInvoker).unwrap();
        let back = from_entries(&[entries], &mut NoInvoker).unwrap();
        let Value::Map(data) = back else { panic!("expected a map") };
        assert_eq!(data.borrow().get(&MapKey("x".into())).unwrap().to_int(), 1);
    }
}
