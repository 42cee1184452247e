//! Member access (`x.name`): the one selector every container
//! understands is `.length`; maps additionally expose their entries
//! directly as fields, so `m.foo` is sugar for `m["foo"]`.

use crate::value::{MapKey, Value};

/// Member access never raises: anything that isn't a container, or a
/// field a map doesn't have, reads back as `Null`, matching this
/// language's member-access silent-coercion policy.
pub(super) fn get_attr(target: &Value, name: &str) -> Value {
    match target.deref() {
        Value::Array(data) if name == "length" => Value::Int(data.borrow().len() as i64),
        Value::String(s) if name == "length" => Value::Int(s.chars().count() as i64),
        Value::Map(data) if name == "length" => Value::Int(data.borrow().len() as i64),
        Value::Map(data) => data.borrow().get(&MapKey(name.into())).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Member assignment is defined only for maps; assigning a field onto
/// anything else is a silent no-op.
pub(super) fn set_attr(target: &Value, name: &str, value: Value) {
    if let Value::Map(data) = target.deref() {
        data.borrow_mut().insert(MapKey(name.into()), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_length_reports_element_count() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(get_attr(&arr, "length").to_int(), 2);
    }

    #[test]
    fn string_length_counts_unicode_scalars() {
        assert_eq!(get_attr(&Value::string("héllo"), "length").to_int(), 5);
    }

    #[test]
    fn map_field_access_reads_entry() {
        let m = Value::empty_map();
        set_attr(&m, "x", Value::Int(9));
        assert_eq!(get_attr(&m, "x").to_int(), 9);
    }

    #[test]
    fn member_access_on_a_non_container_degrades_to_null() {
        assert!(matches!(get_attr(&Value::Int(5), "length"), Value::Null));
    }

    #[test]
    fn member_assignment_on_a_non_map_is_a_silent_no_op() {
        set_attr(&Value::Int(5), "x", Value::Int(1));
    }
}
