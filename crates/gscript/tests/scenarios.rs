//! End-to-end scenarios run through the public `Runtime` façade, each a
//! literal source string evaluated to completion and checked against
//! its expected result.

use gscript::{GscriptError, RuntimeError, Runtime};

fn eval(source: &str) -> gscript::Value {
    Runtime::new().run_string(source).unwrap_or_else(|err| panic!("{source:?} failed: {err}"))
}

fn eval_err(source: &str) -> GscriptError {
    match Runtime::new().run_string(source) {
        Ok(value) => panic!("{source:?} unexpectedly succeeded with {}", value.to_display_string()),
        Err(err) => err,
    }
}

#[test]
fn arithmetic_respects_precedence() {
    let v = eval("4 + 5 * 6");
    assert_eq!(v.to_int(), 34);
    assert!(!v.is_float());
}

#[test]
fn division_promotes_to_float() {
    let v = eval("1 / 2");
    assert!(v.is_float());
    assert_eq!(v.to_float(), 0.5);
}

#[test]
fn string_escape_then_concatenation() {
    let v = eval(r#""he\x20" + "he""#);
    assert_eq!(v.to_display_string(), "he he");
}

#[test]
fn short_circuit_or_falls_through_to_a_float() {
    let v = eval("0 && true || 1.5");
    assert!(v.is_float());
    assert_eq!(v.to_float(), 1.5);
}

#[test]
fn null_concatenates_as_the_empty_string() {
    let v = eval(r#"null + "hehe""#);
    assert_eq!(v.to_display_string(), "hehe");
}

#[test]
fn string_indexing_and_length() {
    assert_eq!(eval(r#""hehe"[1]"#).to_display_string(), "e");
    assert_eq!(eval(r#""hehe".length"#).to_int(), 4);
    assert!(matches!(eval(r#""hehe"[-1]"#), gscript::Value::Null));
}

#[test]
fn array_indexing_and_structural_equality() {
    assert_eq!(eval("[0, 42][1]").to_int(), 42);
    assert!(eval("[] == []").to_bool());
    assert!(!eval("{ a: 1 } == { a: 1, b: 2 }").to_bool());
}

#[test]
fn an_iife_closure_captures_its_enclosing_argument() {
    let v = eval("function (a, b) { return function (c) { return a + c; }(b + 1); }(1, 40)");
    assert_eq!(v.to_int(), 42);
}

#[test]
fn fibonacci_by_y_combinator() {
    // The Y-combinator ties the knot for anonymous recursion: `fib` never
    // refers to itself by name, only through the `self_` parameter each
    // call re-supplies. Base case returns 1 for n < 2, so fib(10) is the
    // 11th term of the 1,1,2,3,5,8,13,21,34,55,89 sequence.
    let source = r"
        let y = function (f) {
            return function (x) { return x(x); }(function (x) {
                return f(function (v) { return x(x)(v); });
            });
        };
        let fib = y(function (self_) {
            return function (n) {
                if (n < 2) {
                    return 1;
                }
                return self_(n - 1) + self_(n - 2);
            };
        });
        fib(10);
    ";
    assert_eq!(eval(source).to_int(), 89);
}

#[test]
fn unbounded_recursion_raises_stack_overflow() {
    let source = r"
        let loop_ = function (n) { return loop_(n + 1); };
        loop_(0);
    ";
    match eval_err(source) {
        GscriptError::Runtime(RuntimeError::StackOverflow { .. }) => {}
        other => panic!("expected a stack overflow, got {other}"),
    }
}

#[test]
fn higher_order_builtins_compose_through_script_closures() {
    let source = r"
        let doubled = map(function (x) { return x * 2; })([1, 2, 3]);
        let evens = filter(function (x) { return x % 2 == 0; })(doubled);
        reduce(function (acc, x) { return acc + x; })(0)(evens);
    ";
    assert_eq!(eval(source).to_int(), 12);
}

#[test]
fn find_and_find_last_locate_matching_elements() {
    let source = r#"
        let xs = [1, 4, 9, 16];
        find(function (x) { return x > 5; })(xs);
    "#;
    assert_eq!(eval(source).to_int(), 9);

    let miss = eval("find(function (x) { return x > 100; })([1, 2, 3]);");
    assert!(matches!(miss, gscript::Value::Null));
}

#[test]
fn to_entries_and_from_entries_round_trip_a_map() {
    let source = r#"
        let m = { a: 1, b: 2 };
        let entries = to_entries(m);
        from_entries(entries) == m;
    "#;
    assert!(eval(source).to_bool());
}

#[test]
fn strings_package_is_reachable_as_a_global() {
    assert_eq!(eval(r#"strings.to_upper("hi")"#).to_display_string(), "HI");
    assert!(eval(r#"strings.has_prefix("hello", "he")"#).to_bool());
    assert_eq!(eval(r#"strings.join(["a", "b", "c"], "-")"#).to_display_string(), "a-b-c");
}

#[test]
fn coercion_builtins_convert_between_kinds() {
    assert_eq!(eval(r#"int("42")"#).to_int(), 42);
    assert_eq!(eval("string(42)").to_display_string(), "42");
    assert!(eval("bool(1)").to_bool());
    assert_eq!(eval("type(1.5)").to_display_string(), "number");
}

#[test]
fn map_keys_normalize_to_their_stringified_form() {
    assert_eq!(eval(r#"{ 1: "a" }["1"]"#).to_display_string(), "a");
    assert_eq!(eval(r#"{ "1": "a" }[1]"#).to_display_string(), "a");
}

#[test]
fn an_unbound_free_identifier_evaluates_to_null() {
    assert!(matches!(eval("nope"), gscript::Value::Null));
}

#[test]
fn map_and_reduce_callbacks_see_the_current_index() {
    let source = r"
        let xs = [10, 20, 30];
        map(function (x, i) { return i; })(xs);
    ";
    assert_eq!(eval(source).to_display_string(), "0,1,2");
}

#[test]
fn find_index_misses_return_negative_one() {
    let source = "find_index(function (x) { return x > 100; })([1, 2, 3]);";
    assert_eq!(eval(source).to_int(), -1);
}

#[test]
fn syntax_errors_surface_as_the_syntax_variant() {
    match eval_err("let = ;") {
        GscriptError::Syntax(_) => {}
        other => panic!("expected a syntax error, got {other}"),
    }
}
