//! Ordering comparisons (`< > <= >=`). Both strings compare
//! lexicographically, both ints compare exactly; everything else
//! coerces to `Float` and compares numerically. Any comparison that
//! can't be resolved into an ordering — either side coerces to `NaN` —
//! is "unordered"; `lt`/`gt`/`le`/`ge` all treat that as `false` rather
//! than raising, matching this language's silent-coercion policy.

use std::cmp::Ordering;

use crate::value::Value;

pub(super) fn order(a: &Value, b: &Value) -> Option<Ordering> {
    let (a, b) = (a.deref(), b.deref());
    match (&a, &b) {
        (Value::String(x), Value::String(y)) => Some(x.as_ref().cmp(y.as_ref())),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        _ => a.to_float().partial_cmp(&b.to_float()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_compare_lexicographically() {
        assert_eq!(order(&Value::string("a"), &Value::string("b")), Some(Ordering::Less));
    }

    #[test]
    fn mixed_int_and_float_compare_numerically() {
        assert_eq!(order(&Value::Int(1), &Value::Float(1.5)), Some(Ordering::Less));
    }

    #[test]
    fn ordering_arrays_coerces_through_float_and_is_unordered() {
        assert_eq!(order(&Value::array(vec![]), &Value::array(vec![])), None);
    }

    #[test]
    fn ordering_involving_nan_is_unordered() {
        assert_eq!(order(&Value::Float(f64::NAN), &Value::Int(1)), None);
    }
}
