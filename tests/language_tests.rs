//! End-to-end language tests: source → parser → evaluator → patched document

use patchlang::error::EvalErrorKind;
use patchlang::{from_json, parse_source, to_json, Context, Error, Libraries, Value};
use serde_json::{json, Value as JsonValue};

/// Runs `source` against `document` and returns the patched document
fn patch(source: &str, document: JsonValue) -> patchlang::Result<JsonValue> {
    let program = parse_source(source, "test.patch")?;
    let root = match from_json(&document) {
        Value::Object(root) => root,
        _ => panic!("test documents are objects"),
    };
    let ctx = Context::new(root.clone(), Libraries::standard());
    program.execute(&ctx)?;
    to_json(&Value::Object(root))
}

fn eval_kind(source: &str) -> EvalErrorKind {
    match patch(source, json!({})) {
        Err(Error::Evaluation(error)) => error.root_cause().kind.clone(),
        other => panic!("expected an evaluation error, got {:?}", other),
    }
}

// =============================================================================
// Name resolution
// =============================================================================

#[test]
fn test_variable_then_root_write() -> anyhow::Result<()> {
    let patched = patch("var $x = 1; x = x + 2;", json!({}))?;
    assert_eq!(patched, json!({"x": 3}));
    Ok(())
}

#[test]
fn test_root_property_shadows_variable_on_read() -> anyhow::Result<()> {
    let patched = patch("var $x = 1; y = x;", json!({"x": 10}))?;
    assert_eq!(patched["y"], json!(10));
    Ok(())
}

#[test]
fn test_this_is_the_root() -> anyhow::Result<()> {
    let patched = patch("n = this is object; this.m = 1;", json!({}))?;
    assert_eq!(patched, json!({"n": true, "m": 1}));
    Ok(())
}

#[test]
fn test_undefined_name() {
    assert!(matches!(
        eval_kind("y = nothing;"),
        EvalErrorKind::UndefinedName { .. }
    ));
    assert!(matches!(
        eval_kind("y = $nothing;"),
        EvalErrorKind::UndefinedVariable { .. }
    ));
}

// =============================================================================
// Scoping
// =============================================================================

#[test]
fn test_duplicate_declaration_in_one_scope() {
    assert!(matches!(
        eval_kind("var $a = 1; var $a = 2;"),
        EvalErrorKind::DuplicateVariable { .. }
    ));
}

#[test]
fn test_child_scope_cannot_shadow() {
    assert!(matches!(
        eval_kind("var $a = 1; { var $a = 2; }"),
        EvalErrorKind::DuplicateVariable { .. }
    ));
}

#[test]
fn test_parent_may_reuse_name_after_child() -> anyhow::Result<()> {
    let patched = patch("{ var $a = 1; } var $a = 2; a = $a;", json!({}))?;
    assert_eq!(patched["a"], json!(2));
    Ok(())
}

#[test]
fn test_foreach_variable_is_fresh_per_iteration() -> anyhow::Result<()> {
    let source = r#"
        fns = [];
        foreach ($n in [1, 2, 3]) {
            fns = fns + [function () -> $n * 10];
        }
        out = [];
        foreach ($f in fns) {
            out = out + [$f()];
        }
        delete fns;
    "#;
    let patched = patch(source, json!({}))?;
    assert_eq!(patched["out"], json!([10, 20, 30]));
    Ok(())
}

// =============================================================================
// Operators
// =============================================================================

#[test]
fn test_precedence_table() -> anyhow::Result<()> {
    let source = r#"
        a = 1 + 2 * 3;
        b = 1 * 2 + 3 * 4;
        c = true == false && true;
        d = !true == false;
        e = -1 - 2;
        f = 2 ** 3 ** 2;
        g = 1 << 2 + 1;
    "#;
    let patched = patch(source, json!({}))?;
    assert_eq!(
        patched,
        json!({"a": 7, "b": 14, "c": false, "d": true, "e": -3, "f": 512, "g": 8})
    );
    Ok(())
}

#[test]
fn test_object_addition_keeps_left_then_right_order() -> anyhow::Result<()> {
    let patched = patch("o = {a: 1, b: 2, c: 3} + {b: 20};", json!({}))?;
    assert_eq!(
        serde_json::to_string(&patched["o"])?,
        r#"{"a":1,"c":3,"b":20}"#
    );
    Ok(())
}

#[test]
fn test_membership_and_kind_tests() -> anyhow::Result<()> {
    let source = r#"
        a = 2 in [1, 2, 3];
        b = "k" in {k: null};
        c = "z" in {k: null};
        d = [] is array;
        e = null is object;
        f = "ab" * 2;
    "#;
    let patched = patch(source, json!({}))?;
    assert_eq!(
        patched,
        json!({"a": true, "b": true, "c": false, "d": true, "e": false, "f": "abab"})
    );
    Ok(())
}

#[test]
fn test_logical_operators_short_circuit() -> anyhow::Result<()> {
    let patched = patch("a = false && $undefined; b = true || $undefined;", json!({}))?;
    assert_eq!(patched, json!({"a": false, "b": true}));
    Ok(())
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval_kind("x = 1 / 0;"), EvalErrorKind::DivisionByZero);
    assert_eq!(eval_kind("x = 1 % 0;"), EvalErrorKind::DivisionByZero);
}

#[test]
fn test_compound_assignment() -> anyhow::Result<()> {
    let patched = patch(
        "n += 5; s += \"!\"; l += [3]; m = {}; m.k = 1; m.k *= 7;",
        json!({"n": 1, "s": "hi", "l": [1, 2]}),
    )?;
    assert_eq!(
        patched,
        json!({"n": 6, "s": "hi!", "l": [1, 2, 3], "m": {"k": 7}})
    );
    Ok(())
}

// =============================================================================
// Objects and arrays
// =============================================================================

#[test]
fn test_negative_index() -> anyhow::Result<()> {
    let patched = patch("last = items[-1]; items[-2] = 0;", json!({"items": [1, 2, 3]}))?;
    assert_eq!(patched, json!({"items": [1, 0, 3], "last": 3}));
    Ok(())
}

#[test]
fn test_index_out_of_bounds_has_span() {
    for source in ["x = items[3];", "x = items[-4];"] {
        match patch(source, json!({"items": [1, 2, 3]})) {
            Err(Error::Evaluation(error)) => {
                assert!(matches!(error.kind, EvalErrorKind::IndexOutOfBounds { length: 3, .. }));
                let span = error.span.expect("span");
                assert_eq!(span.from.line, 1);
                assert_eq!(span.from.column, 5);
            }
            other => panic!("expected out of bounds, got {:?}", other),
        }
    }
}

#[test]
fn test_objects_are_shared_by_reference() -> anyhow::Result<()> {
    let patched = patch("val $alias = config; $alias.debug = true;", json!({"config": {}}))?;
    assert_eq!(patched["config"], json!({"debug": true}));
    Ok(())
}

#[test]
fn test_missing_key() {
    assert!(matches!(
        eval_kind("o = {}; x = o.nope;"),
        EvalErrorKind::MissingKey { .. }
    ));
}

#[test]
fn test_delete_keeps_order() -> anyhow::Result<()> {
    let patched = patch("delete b; delete list[0];", json!({"a": 1, "b": 2, "c": 3, "list": [1, 2]}))?;
    assert_eq!(
        serde_json::to_string(&patched)?,
        r#"{"a":1,"c":3,"list":[2]}"#
    );
    Ok(())
}

// =============================================================================
// Control flow and functions
// =============================================================================

#[test]
fn test_while_with_break() -> anyhow::Result<()> {
    let source = r#"
        var $i = 0;
        while (true) {
            $i++;
            if ($i >= 4) break;
        }
        count = $i;
    "#;
    assert_eq!(patch(source, json!({}))?["count"], json!(4));
    Ok(())
}

#[test]
fn test_foreach_over_object_keys() -> anyhow::Result<()> {
    let source = r#"
        keys = [];
        foreach ($k in settings) keys = keys + [$k];
    "#;
    let patched = patch(source, json!({"settings": {"b": 1, "a": 2}}))?;
    assert_eq!(patched["keys"], json!(["b", "a"]));
    Ok(())
}

#[test]
fn test_return_from_nested_loop() -> anyhow::Result<()> {
    let source = r#"
        function first_even($list) {
            foreach ($n in $list) {
                if ($n % 2 == 0) return $n;
            }
            return null;
        }
        a = first_even([1, 3, 4, 6]);
        b = first_even([1]);
    "#;
    assert_eq!(patch(source, json!({}))?, json!({"a": 4, "b": null}));
    Ok(())
}

#[test]
fn test_function_without_return_yields_null() -> anyhow::Result<()> {
    let patched = patch("function f() { var $x = 1; } r = f();", json!({}))?;
    assert_eq!(patched["r"], json!(null));
    Ok(())
}

#[test]
fn test_expression_bodied_function() -> anyhow::Result<()> {
    let patched = patch("val $sq = function ($n) -> $n * $n; r = $sq(7);", json!({}))?;
    assert_eq!(patched["r"], json!(49));
    Ok(())
}

#[test]
fn test_arity_mismatch() {
    assert!(matches!(
        eval_kind("function f($a, $b) { } f(1);"),
        EvalErrorKind::ArityMismatch { got: 1, .. }
    ));
}

#[test]
fn test_calling_a_non_function() {
    assert!(matches!(
        eval_kind("x = 1; x();"),
        EvalErrorKind::NotCallable { .. }
    ));
}

#[test]
fn test_apply_delegates_to_sub_object() -> anyhow::Result<()> {
    let source = r#"
        apply (server) {
            port = port + 1;
            tls = true;
        }
    "#;
    let patched = patch(source, json!({"server": {"port": 8080}}))?;
    assert_eq!(patched, json!({"server": {"port": 8081, "tls": true}}));
    Ok(())
}

#[test]
fn test_apply_requires_object() {
    assert!(matches!(
        eval_kind("apply (1) { x = 1; }"),
        EvalErrorKind::TypeError { .. }
    ));
}

#[test]
fn test_error_inside_call_reports_chain() {
    match patch("function inner() { return 1 / 0; } function outer() { return inner(); } outer();", json!({})) {
        Err(error) => {
            let message = error.to_string();
            assert!(message.contains("Error in call to 'outer'"));
            assert!(message.contains("caused by"));
            assert!(message.contains("Division by zero"));
        }
        Ok(_) => panic!("expected failure"),
    }
}

#[test]
fn test_functions_cannot_be_written_to_json() {
    assert!(matches!(
        patch("f = function () -> 1;", json!({})),
        Err(Error::Json(_))
    ));
}
