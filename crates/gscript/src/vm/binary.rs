//! Arithmetic. Every operator here is total: operands are coerced via
//! `Value::to_int`/`to_float` rather than type-checked, matching the
//! value model's "coercions never fail" design. Only `neg` can still
//! observe a genuinely non-numeric operand and simply coerces it too —
//! there is no way to make `-"abc"` an error without breaking that
//! invariant, so it evaluates to `-0`.

use crate::error::RuntimeError;
use crate::value::Value;

pub(super) fn neg(v: &Value) -> Result<Value, RuntimeError> {
    Ok(if v.is_float() {
        Value::Float(-v.to_float())
    } else {
        Value::Int(v.to_int().wrapping_neg())
    })
}

/// `+` concatenates when either operand is a string. Null's contribution
/// to a concatenation is the empty string, not the literal text `"null"`
/// `to_display_string` would otherwise render — so `null + "hehe"` is
/// `"hehe"`, not `"nullhehe"`.
pub(super) fn add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if is_string(a) || is_string(b) {
        return Ok(Value::string(format!("{}{}", concat_string(a), concat_string(b))));
    }
    Ok(numeric(a, b, |x, y| x.wrapping_add(y), |x, y| x + y))
}

fn concat_string(v: &Value) -> String {
    match v.deref() {
        Value::Null => String::new(),
        other => other.to_display_string(),
    }
}

pub(super) fn sub(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(numeric(a, b, |x, y| x.wrapping_sub(y), |x, y| x - y))
}

/// Integer overflow promotes to float rather than wrapping, since
/// silent wraparound on multiplication is far more likely to be a bug
/// than an intended result.
pub(super) fn mul(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if !a.is_float() && !b.is_float() {
        if let Some(product) = a.to_int().checked_mul(b.to_int()) {
            return Ok(Value::Int(product));
        }
        return Ok(Value::Float(a.to_float() * b.to_float()));
    }
    Ok(Value::Float(a.to_float() * b.to_float()))
}

/// Division always yields a float, following IEEE 754 semantics
/// (including division by zero producing `inf`/`nan` rather than an
/// error).
pub(super) fn div(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Float(a.to_float() / b.to_float()))
}

pub(super) fn rem(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if a.is_float() || b.is_float() || b.to_int() == 0 {
        return Ok(Value::Float(a.to_float() % b.to_float()));
    }
    Ok(Value::Int(a.to_int().wrapping_rem(b.to_int())))
}

pub(super) fn xor(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Int(a.to_int() ^ b.to_int()))
}

pub(super) fn shl(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let shift = (b.to_int() as u32) & 63;
    Ok(Value::Int(a.to_int().wrapping_shl(shift)))
}

pub(super) fn shr(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let shift = (b.to_int() as u32) & 63;
    Ok(Value::Int(a.to_int().wrapping_shr(shift)))
}

fn is_string(v: &Value) -> bool {
    matches!(v.deref(), Value::String(_))
}

fn numeric(a: &Value, b: &Value, int_op: impl Fn(i64, i64) -> i64, float_op: impl Fn(f64, f64) -> f64) -> Value {
    if a.is_float() || b.is_float() {
        Value::Float(float_op(a.to_float(), b.to_float()))
    } else {
        Value::Int(int_op(a.to_int(), b.to_int()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concatenates_when_either_side_is_a_string() {
        let result = add(&Value::Null, &Value::string("x")).unwrap();
        assert_eq!(result.to_display_string(), "x");
    }

    #[test]
    fn add_concatenates_numbers_and_strings() {
        let result = add(&Value::Int(5), &Value::string(" apples")).unwrap();
        assert_eq!(result.to_display_string(), "5 apples");
    }

    #[test]
    fn add_wraps_on_integer_overflow() {
        let result = add(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert_eq!(result.to_int(), i64::MIN);
    }

    #[test]
    fn mul_promotes_to_float_on_overflow() {
        let result = mul(&Value::Int(i64::MAX), &Value::Int(2)).unwrap();
        assert!(result.is_float());
    }

    #[test]
    fn div_by_zero_yields_infinity_not_an_error() {
        let result = div(&Value::Int(1), &Value::Int(0)).unwrap();
        assert!(result.to_float().is_infinite());
    }
}
