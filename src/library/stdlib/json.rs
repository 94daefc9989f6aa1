//! `json` - text encoding of values

use serde_json::Value as JsonValue;

use crate::error::{EvalResult, EvaluationError};
use crate::library::Library;
use crate::runtime::{from_json, to_json, Value};

/// The `json` library
pub static LIBRARY: Library = Library {
    name: "json",
    constants: &[],
    functions: &[
        native!("json", "stringify", (Any) => pure stringify),
        native!("json", "pretty", (Any) => pure pretty),
        native!("json", "parse", (String) => pure parse),
    ],
};

fn encode(value: &Value, pretty: bool) -> EvalResult<Value> {
    let json = to_json(value).map_err(|e| EvaluationError::runtime(e.to_string()))?;
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| EvaluationError::runtime(e.to_string()))?;
    Ok(Value::string(text))
}

fn stringify(args: &[Value]) -> EvalResult<Value> {
    encode(&args[0], false)
}

fn pretty(args: &[Value]) -> EvalResult<Value> {
    encode(&args[0], true)
}

fn parse(args: &[Value]) -> EvalResult<Value> {
    let json: JsonValue = serde_json::from_str(args[0].as_str()?)
        .map_err(|e| EvaluationError::runtime(format!("Invalid JSON: {}", e)))?;
    Ok(from_json(&json))
}
