//! `debug` - logging and assertions

use crate::error::{EvalResult, EvaluationError};
use crate::library::{CallContext, Library};
use crate::runtime::Value;

/// The `debug` library
pub static LIBRARY: Library = Library {
    name: "debug",
    constants: &[],
    functions: &[
        native!("debug", "log", (Any) => ctx log),
        native!(
            "debug",
            "assert",
            (Any) => ctx assert,
            (Any, String) => ctx assert_with_message
        ),
    ],
};

/// Emits the value through `tracing` at the caller's location
fn log(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    tracing::info!(location = %call.span, "{}", args[0].to_display_string());
    Ok(Value::Null)
}

fn check(call: &CallContext<'_>, condition: &Value, message: &str) -> EvalResult<Value> {
    if condition.as_boolean() {
        Ok(Value::Null)
    } else {
        Err(EvaluationError::runtime(format!("{} at {}", message, call.span)))
    }
}

fn assert(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    check(call, &args[0], "Assertion failed")
}

fn assert_with_message(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    check(call, &args[0], args[1].as_str()?)
}
