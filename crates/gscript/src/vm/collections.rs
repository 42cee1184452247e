//! Array/map construction and indexing.

use crate::error::RuntimeError;
use crate::value::{MapKey, Value};

pub(super) fn array_push(receiver: &Value, value: Value) {
    let Value::Array(data) = receiver else {
        unreachable!("ArrayPush always runs against a freshly built array");
    };
    data.borrow_mut().push(value);
}

pub(super) fn array_extend(receiver: &Value, value: &Value) -> Result<(), RuntimeError> {
    let Value::Array(data) = receiver else {
        unreachable!("ArrayExtend always runs against a freshly built array");
    };
    let iter = value
        .iter()
        .ok_or_else(|| RuntimeError::Type(format!("cannot spread a {} into an array", value.type_name())))?;
    for (_, item) in iter {
        data.borrow_mut().push(item);
    }
    Ok(())
}

pub(super) fn map_insert(receiver: &Value, key: &Value, value: Value) {
    let Value::Map(data) = receiver else {
        unreachable!("MapInsert always runs against a freshly built map");
    };
    data.borrow_mut().insert(MapKey::from_value(&key.deref()), value);
}

pub(super) fn map_extend(receiver: &Value, value: &Value) -> Result<(), RuntimeError> {
    let Value::Map(data) = receiver else {
        unreachable!("MapExtend always runs against a freshly built map");
    };
    let Value::Map(other) = value.deref() else {
        return Err(RuntimeError::Type(format!("cannot spread a {} into a map", value.type_name())));
    };
    let entries: Vec<(MapKey, Value)> = other.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    let mut data = data.borrow_mut();
    for (k, v) in entries {
        data.insert(k, v);
    }
    Ok(())
}

/// Indexing never raises: an out-of-range index or indexing a
/// non-container both read back as `Null`, matching this language's
/// indexing silent-coercion policy. A map key is always its
/// `to_display_string()`, so every value is a valid key.
pub(super) fn get_index(target: &Value, index: &Value) -> Value {
    match target.deref() {
        Value::Array(data) => {
            let data = data.borrow();
            match normalize_index(index.to_int(), data.len()) {
                Some(idx) => data[idx].clone(),
                None => Value::Null,
            }
        }
        Value::Map(data) => data.borrow().get(&MapKey::from_value(&index.deref())).cloned().unwrap_or(Value::Null),
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            match normalize_index(index.to_int(), chars.len()) {
                Some(idx) => Value::string(chars[idx].to_string()),
                None => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

/// Assignment is defined only for arrays (in-range integer index) and
/// maps; every other combination is a silent no-op.
pub(super) fn set_index(target: &Value, index: &Value, value: Value) {
    match target.deref() {
        Value::Array(data) => {
            let mut data = data.borrow_mut();
            let len = data.len();
            if let Some(idx) = normalize_index(index.to_int(), len) {
                data[idx] = value;
            }
        }
        Value::Map(data) => {
            data.borrow_mut().insert(MapKey::from_value(&index.deref()), value);
        }
        _ => {}
    }
}

/// Bounds-checks a script index against a concrete length. Negative
/// indices are out of range, not Python-style wraparound: the language
/// has no negative-indexing sugar, so `a[-1]` degrades to `Null` exactly
/// like any other out-of-range access.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 || index as usize >= len {
        None
    } else {
        Some(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_negative_index_degrades_to_null() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(get_index(&arr, &Value::Int(-1)), Value::Null));
    }

    #[test]
    fn array_out_of_bounds_degrades_to_null() {
        let arr = Value::array(vec![Value::Int(1)]);
        assert!(matches!(get_index(&arr, &Value::Int(5)), Value::Null));
    }

    #[test]
    fn string_index_returns_single_character() {
        let s = Value::string("hello");
        assert_eq!(get_index(&s, &Value::Int(1)).to_display_string(), "e");
    }

    #[test]
    fn string_negative_index_degrades_to_null() {
        let s = Value::string("hehe");
        assert!(matches!(get_index(&s, &Value::Int(-1)), Value::Null));
    }

    #[test]
    fn map_missing_key_yields_null_not_an_error() {
        let m = Value::empty_map();
        assert!(matches!(get_index(&m, &Value::string("missing")), Value::Null));
    }

    #[test]
    fn indexing_a_non_container_degrades_to_null() {
        assert!(matches!(get_index(&Value::Int(5), &Value::Int(0)), Value::Null));
    }

    #[test]
    fn numeric_and_string_keys_collide_by_stringified_form() {
        let m = Value::empty_map();
        set_index(&m, &Value::Int(1), Value::string("a"));
        assert_eq!(get_index(&m, &Value::string("1")).to_display_string(), "a");
        set_index(&m, &Value::string("2"), Value::string("b"));
        assert_eq!(get_index(&m, &Value::Int(2)).to_display_string(), "b");
    }
}
