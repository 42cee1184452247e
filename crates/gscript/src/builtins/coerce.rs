//! `bool`, `int`, `number`, `string`, `type` — the §4.6 coercion
//! built-ins. Each applies the matching total `Value::to_*` conversion
//! to its first argument, so these are thin adapters rather than
//! independent logic.

use crate::builtins::arg;
use crate::value::{NativeFn, Value};
use std::rc::Rc;

type Entry = (&'static str, Option<usize>, NativeFn);

pub(super) fn entries() -> Vec<Entry> {
    vec![
        ("bool", Some(1), Rc::new(|args, _| Ok(Value::Bool(arg(args, 0).to_bool())))),
        ("int", Some(1), Rc::new(|args, _| Ok(Value::Int(arg(args, 0).to_int())))),
        ("number", Some(1), Rc::new(|args, _| Ok(arg(args, 0).to_number()))),
        ("string", Some(1), Rc::new(|args, _| Ok(Value::string(arg(args, 0).to_display_string())))),
        ("type", Some(1), Rc::new(|args, _| Ok(Value::string(arg(args, 0).script_type_tag())))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Invoker;
    use crate::error::RuntimeError;

    struct NoInvoker;
    impl Invoker for NoInvoker {
        fn call(&mut self, _func: &crate::value::Function, _args: &[Value]) -> Result<Value, RuntimeError> {
            unreachable!("coercion builtins never call back into scripts")
        }
    }

    fn call(name: &str, args: &[Value]) -> Value {
        let entries = entries();
        let (_, _, f) = entries.into_iter().find(|(n, _, _)| *n == name).unwrap();
        f(args, &mut NoInvoker).unwrap()
    }

    #[test]
    fn bool_coerces_truthiness() {
        assert!(!call("bool", &[Value::Int(0)]).to_bool());
        assert!(call("bool", &[Value::string("x")]).to_bool());
    }

    #[test]
    fn int_truncates_floats_toward_zero() {
        assert_eq!(call("int", &[Value::Float(4.9)]).to_int(), 4);
        assert_eq!(call("int", &[Value::Float(-4.9)]).to_int(), -4);
    }

    #[test]
    fn number_preserves_integer_ness() {
        assert_eq!(call("number", &[Value::string("42")]).to_int(), 42);
        assert!(call("number", &[Value::string("4.2")]).is_float());
    }

    #[test]
    fn string_renders_display_form() {
        assert_eq!(call("string", &[Value::Null]).to_display_string(), "null");
    }

    #[test]
    fn type_tags_collapse_int_and_float_to_number() {
        assert_eq!(call("type", &[Value::Int(1)]).to_display_string(), "number");
        assert_eq!(call("type", &[Value::Float(1.0)]).to_display_string(), "number");
        assert_eq!(call("type", &[Value::array(vec![])]).to_display_string(), "array");
    }

    #[test]
    fn missing_argument_degrades_to_null_coercion() {
        assert!(!call("bool", &[]).to_bool());
    }
}
