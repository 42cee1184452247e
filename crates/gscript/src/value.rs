//! The dynamic value model shared by the compiler's constant pool, the
//! VM's stacks and stashes, and the host-facing runtime façade.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::bytecode::Program;
use crate::error::RuntimeError;
use crate::stash::Stash;

/// An array is a shared, mutable, ordered sequence of values. Shared
/// because arrays have reference semantics: two variables bound to the
/// same array literal alias the same storage, mirroring how maps and
/// closures behave in this language.
pub type ArrayData = Rc<RefCell<Vec<Value>>>;

/// A map preserves insertion order for `to_entries`/literal reconstruction
/// but is iterated (§4.6 "Iterable" contract) in *sorted key order*,
/// computed lazily at iteration time rather than maintained continuously,
/// since most maps are read far more often than iterated.
pub type MapData = Rc<RefCell<IndexMap<MapKey, Value, ahash::RandomState>>>;

/// A map is `string -> Value` (spec.md §3): every key, whatever its
/// source variant, is normalized to its `to_display_string()` rendering
/// before storage or lookup, so `{ 1: "a" }["1"]` and `{ "1": "a" }[1]`
/// name the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapKey(pub Rc<str>);

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl MapKey {
    /// Total conversion: every value stringifies to some map key, the
    /// same rule `get`/`set` use on an index operand.
    pub fn from_value(v: &Value) -> MapKey {
        MapKey(v.to_display_string().into())
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

/// A compiled, closed-over function: a pointer to the shared program it
/// was compiled from, the entry instruction offset, the number of
/// declared parameters, the local-stack slots it needs, and the
/// captured environment chain (its defining stash), or `None` for a
/// "stashless" function whose body never escapes into a nested closure.
///
/// `program` is a `Weak` reference rather than `Rc`: the program's own
/// constant pool holds these `CompiledFunction`s, so a strong
/// back-reference would make every compiled program a self-referential
/// `Rc` cycle that never deallocates. The host-held `Rc<Program>`
/// returned by `compile` keeps the program alive for as long as any
/// function value derived from it can still be called.
#[derive(Debug)]
pub struct CompiledFunction {
    pub(crate) name: Option<String>,
    pub(crate) program: Weak<Program>,
    pub(crate) entry: u32,
    pub(crate) arity: usize,
    pub(crate) frame_size: usize,
    /// Whether the compiler determined this function's scope is
    /// captured by a nested closure and therefore needs a real
    /// [`Stash`] at call time, rather than running "stashless" with
    /// locals living directly on the VM's operand stack.
    pub(crate) needs_stash: bool,
    pub(crate) captured: Option<Rc<Stash>>,
}

/// Lets a native function call back into a script-defined closure, e.g.
/// the curried `map`/`filter`/`reduce` builtins invoking the callback
/// they were handed. Implemented by the VM; kept as a trait here so
/// `value.rs` has no dependency on the VM module.
pub trait Invoker {
    fn call(&mut self, func: &Function, args: &[Value]) -> Result<Value, RuntimeError>;
}

/// A host-supplied function exposed to scripts. Boxed as `dyn Fn` so the
/// runtime façade can register closures over host state without a
/// generic parameter leaking into `Value`. Receives an `Invoker` so
/// builtins that take a callback argument (`map`, `filter`, `reduce`,
/// `find*`, `curry`) can call back into the VM.
pub type NativeFn = Rc<dyn Fn(&[Value], &mut dyn Invoker) -> Result<Value, RuntimeError>>;

pub struct NativeFunction {
    pub name: String,
    pub arity: Option<usize>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Function {
    Compiled(Rc<CompiledFunction>),
    Native(Rc<NativeFunction>),
}

impl Function {
    pub fn name(&self) -> Option<&str> {
        match self {
            Function::Compiled(f) => f.name.as_deref(),
            Function::Native(f) => Some(&f.name),
        }
    }
}

/// The dynamic value every expression evaluates to.
///
/// `Ref` is a single-slot mutable cell (`Rc<RefCell<Value>>`) wrapping an
/// opaque host value that [`crate::runtime::Runtime::to_value`] couldn't
/// fold into one of the other variants. It exists so a host can hand a
/// script a value that is neither a primitive nor one of this language's
/// two container kinds, while still letting `deref` transparently unwrap
/// it everywhere a plain `Value` is expected.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<str>),
    Array(ArrayData),
    Map(MapData),
    Function(Function),
    Ref(Rc<RefCell<Value>>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<MapKey, Value, ahash::RandomState>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn empty_map() -> Value {
        Value::Map(Rc::new(RefCell::new(IndexMap::default())))
    }

    /// Resolves through a `Ref` cell to the value it currently holds,
    /// leaving every other variant untouched. Most call sites that
    /// inspect a value's "real" kind should go through this first.
    pub fn deref(&self) -> Value {
        match self {
            Value::Ref(cell) => cell.borrow().deref(),
            other => other.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.deref() {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Ref(_) => unreachable!("deref resolves Ref"),
        }
    }

    /// Truthiness used by `if`/`for`/`&&`/`||`: `null`, `false`, `0`,
    /// `0.0`, and `""` are falsy; everything else (including empty
    /// arrays and maps) is truthy.
    pub fn to_bool(&self) -> bool {
        match self.deref() {
            Value::Null => false,
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Total coercion to `i64`: floats truncate toward zero, strings
    /// parse as integers (defaulting to 0 on failure), booleans map to
    /// 0/1, null to 0.
    pub fn to_int(&self) -> i64 {
        match self.deref() {
            Value::Null => 0,
            Value::Bool(b) => i64::from(b),
            Value::Int(i) => i,
            Value::Float(f) => f as i64,
            Value::String(s) => parse_int_auto_base(s.trim()).unwrap_or(0),
            _ => 0,
        }
    }

    /// Total coercion to `f64`, following the same rules as `to_int` but
    /// preserving fractional values.
    pub fn to_float(&self) -> f64 {
        match self.deref() {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Total coercion to a numeric `Value` (`Int` or `Float`), preserving
    /// integer-ness rather than always widening to `Float` the way
    /// `to_float` does: a string first tries a base-0 integer parse on a
    /// trimmed copy, falling back to `Float` only if that fails.
    pub fn to_number(&self) -> Value {
        match self.deref() {
            Value::String(s) => match parse_int_auto_base(s.trim()) {
                Some(i) => Value::Int(i),
                None => Value::Float(self.to_float()),
            },
            Value::Int(i) => Value::Int(i),
            other => Value::Float(other.to_float()),
        }
    }

    /// `true` when the deref'd value is a `Float`; used by arithmetic to
    /// decide whether a binary numeric op should promote to float.
    pub fn is_float(&self) -> bool {
        matches!(self.deref(), Value::Float(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self.deref(), Value::Int(_) | Value::Float(_))
    }

    /// `type(v)`'s tag, per the coercion builtins' contract: unlike
    /// [`Value::type_name`], `Int`/`Float` collapse into a single
    /// `"number"` tag (the script surface has no separate int/float
    /// type, only a representation detail the VM tracks internally).
    pub fn script_type_tag(&self) -> &'static str {
        match self.deref() {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Ref(_) => unreachable!("deref resolves Ref"),
        }
    }

    /// Total coercion to `Function`: identity for function values, a
    /// sentinel "empty function" (returns `Null`, takes any arguments)
    /// otherwise. Used by the call instruction and the pipe operator so
    /// that calling a non-function degrades to `Null` rather than
    /// raising, matching this language's silent-coercion policy.
    pub fn to_function(&self) -> Function {
        match self.deref() {
            Value::Function(f) => f,
            _ => empty_function(),
        }
    }

    /// Human-readable rendering used by `string(v)`, string
    /// concatenation, and the CLI's final-result print.
    pub fn to_display_string(&self) -> String {
        match self.deref() {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(f),
            Value::String(s) => s.to_string(),
            Value::Array(items) => {
                let items = items.borrow();
                let rendered: Vec<String> = items.iter().map(Value::to_display_string).collect();
                rendered.join(",")
            }
            Value::Map(_) => "[object Map]".to_string(),
            Value::Function(Function::Native(_)) => "function () { [ native code ] }".to_string(),
            Value::Function(Function::Compiled(_)) => "function () {}".to_string(),
            Value::Ref(_) => unreachable!("deref resolves Ref"),
        }
    }

    /// Cross-type value equality (`==`): numbers compare by numeric
    /// value regardless of Int/Float, strings/bools/null compare by
    /// value, containers compare structurally by element, functions
    /// compare by identity (two closures are `==` only if they are the
    /// exact same object).
    pub fn equals(&self, other: &Value) -> bool {
        let (a, b) = (self.deref(), other.deref());
        match (&a, &b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                if a.is_float() || b.is_float() {
                    a.to_float() == b.to_float()
                } else {
                    a.to_int() == b.to_int()
                }
            }
            // A string compares against a number/bool by parsing itself as a
            // number first (`ToNumber`), never by stringifying the other side.
            (Value::String(_), Value::Int(_) | Value::Float(_) | Value::Bool(_)) => a.to_number().equals(&b),
            (Value::Int(_) | Value::Float(_) | Value::Bool(_), Value::String(_)) => b.to_number().equals(&a),
            (Value::Bool(_), Value::Int(_) | Value::Float(_)) => a.to_int() == b.to_int(),
            (Value::Int(_) | Value::Float(_), Value::Bool(_)) => a.to_int() == b.to_int(),
            (Value::Array(x), Value::Array(y)) => {
                if Rc::ptr_eq(x, y) {
                    return true;
                }
                let (x, y) = (x.borrow(), y.borrow());
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| a.equals(b))
            }
            (Value::Map(x), Value::Map(y)) => {
                if Rc::ptr_eq(x, y) {
                    return true;
                }
                let (x, y) = (x.borrow(), y.borrow());
                x.len() == y.len()
                    && x.iter().all(|(k, v)| y.get(k).is_some_and(|other_v| v.equals(other_v)))
            }
            (Value::Function(x), Value::Function(y)) => x.same_as(y),
            _ => false,
        }
    }

    /// Strict identity (`SameAs`): used by the compiler's constant-pool
    /// de-duplication and available to scripts as reference equality.
    /// Unlike `equals`, `SameAs` never coerces across numeric kinds and
    /// treats `NaN` as not same as itself, matching IEEE identity rather
    /// than value equality.
    pub fn same_as(&self, other: &Value) -> bool {
        let (a, b) = (self.deref(), other.deref());
        match (&a, &b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
            (Value::String(x), Value::String(y)) => Rc::ptr_eq(x, y) || x == y,
            (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
            (Value::Map(x), Value::Map(y)) => Rc::ptr_eq(x, y),
            (Value::Function(x), Value::Function(y)) => x.same_as(y),
            _ => false,
        }
    }
}

/// The sentinel function `ToFunction` coerces non-callables to: takes
/// any arguments, always returns `Null`.
fn empty_function() -> Function {
    Function::Native(Rc::new(NativeFunction {
        name: String::new(),
        arity: None,
        func: Rc::new(|_args, _invoker| Ok(Value::Null)),
    }))
}

impl Function {
    fn same_as(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Compiled(x), Function::Compiled(y)) => Rc::ptr_eq(x, y),
            (Function::Native(x), Function::Native(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }
}

/// Parses an integer the way `ToNumber`'s string branch and the
/// scanner's numeric literals agree on: an optional sign, then `0x`/`0X`
/// hex, a bare leading `0` followed by octal digits, or plain decimal.
/// Returns `None` (rather than 0) when the text isn't a clean integer,
/// so callers can fall back to a float parse.
fn parse_int_auto_base(s: &str) -> Option<i64> {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if rest.len() > 1 && rest.starts_with('0') && rest.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        i64::from_str_radix(rest, 8).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if neg { -magnitude } else { magnitude })
}

/// Formats a float the way scripts expect to see numbers printed:
/// integral floats print with a trailing `.0` so `1.0` is visibly
/// distinct from the integer `1`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else if f == f.trunc() && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

/// The iteration protocol backing `for`-over-values and the curried
/// higher-order builtins: arrays iterate front-to-back by current
/// length (so truncation during iteration simply ends it early), maps
/// iterate in ascending key order computed once when iteration starts.
pub enum ValueIter {
    Array { data: ArrayData, index: usize },
    Map { keys: Vec<MapKey>, data: MapData, index: usize },
}

impl Value {
    /// Builds an iterator over the deref'd value, or `None` if the value
    /// is not iterable (per the §4.6 Iterable contract: arrays and maps
    /// only).
    pub fn iter(&self) -> Option<ValueIter> {
        match self.deref() {
            Value::Array(data) => Some(ValueIter::Array { data, index: 0 }),
            Value::Map(data) => {
                let mut keys: Vec<MapKey> = data.borrow().keys().cloned().collect();
                keys.sort();
                Some(ValueIter::Map { keys, data, index: 0 })
            }
            _ => None,
        }
    }
}

impl Iterator for ValueIter {
    /// `(key_or_index, value)` pairs, matching the `to_entries` shape.
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ValueIter::Array { data, index } => {
                let items = data.borrow();
                if *index >= items.len() {
                    return None;
                }
                let value = items[*index].clone();
                let key = Value::Int(*index as i64);
                *index += 1;
                Some((key, value))
            }
            ValueIter::Map { keys, data, index } => loop {
                if *index >= keys.len() {
                    return None;
                }
                let key = keys[*index].clone();
                *index += 1;
                let map = data.borrow();
                if let Some(value) = map.get(&key) {
                    return Some((key.to_value(), value.clone()));
                }
                // Key was removed during iteration; skip it.
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_crosses_int_and_float() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(!Value::Int(2).same_as(&Value::Float(2.0)));
    }

    #[test]
    fn nan_is_not_same_as_itself() {
        let nan = Value::Float(f64::NAN);
        assert!(!nan.same_as(&nan));
    }

    #[test]
    fn arrays_compare_structurally() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert!(a.equals(&b));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn truthiness_matches_falsy_set() {
        assert!(!Value::Null.to_bool());
        assert!(!Value::Int(0).to_bool());
        assert!(!Value::string("").to_bool());
        assert!(Value::array(vec![]).to_bool());
    }

    #[test]
    fn float_display_keeps_trailing_dot_zero() {
        assert_eq!(Value::Float(4.0).to_display_string(), "4.0");
        assert_eq!(Value::Float(0.5).to_display_string(), "0.5");
    }

    #[test]
    fn array_display_is_a_bare_comma_join() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a.to_display_string(), "1,2");
    }

    #[test]
    fn map_display_is_the_object_map_literal() {
        assert_eq!(Value::empty_map().to_display_string(), "[object Map]");
    }

    #[test]
    fn string_compares_equal_to_number_by_value() {
        assert!(Value::string("1").equals(&Value::Int(1)));
        assert!(Value::Int(1).equals(&Value::string("1")));
        assert!(!Value::string("1.5").equals(&Value::Int(1)));
    }

    #[test]
    fn bool_compares_equal_to_number_as_int() {
        assert!(Value::Bool(true).equals(&Value::Int(1)));
        assert!(Value::Bool(false).equals(&Value::Float(0.0)));
    }

    #[test]
    fn null_equals_only_null() {
        assert!(!Value::Null.equals(&Value::Int(0)));
        assert!(Value::Null.equals(&Value::Null));
    }

    #[test]
    fn map_iterates_in_sorted_key_order() {
        let mut entries: IndexMap<MapKey, Value, ahash::RandomState> = IndexMap::default();
        entries.insert(MapKey("b".into()), Value::Int(2));
        entries.insert(MapKey("a".into()), Value::Int(1));
        let m = Value::map(entries);
        let keys: Vec<Value> = m.iter().unwrap().map(|(k, _)| k).collect();
        assert_eq!(keys[0].to_display_string(), "a");
        assert_eq!(keys[1].to_display_string(), "b");
    }
}
