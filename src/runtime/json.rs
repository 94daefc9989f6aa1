//! Conversion between script values and `serde_json` documents

use serde_json::{Map, Number, Value as JsonValue};

use super::value::{to_integer, Value};
use crate::error::{Error, Result};

/// Deepest nesting [`to_json`] will follow; deeper values are rejected as cyclic
pub const MAX_JSON_DEPTH: usize = 512;

/// Most values [`to_json`] will emit; shared containers count once per occurrence
pub const MAX_JSON_NODES: usize = 16 * 1024 * 1024;

/// Largest integer a double represents exactly
const MAX_SAFE_INTEGER: i64 = 1 << 53;

/// Builds a script value from a JSON document. Object key order is kept.
pub fn from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Value::string(s),
        JsonValue::Array(items) => Value::array(items.iter().map(from_json).collect()),
        JsonValue::Object(entries) => Value::object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), from_json(value)))
                .collect(),
        ),
    }
}

/// Converts a script value back to JSON.
///
/// Fails on functions, non-finite numbers, values nested deeper than
/// [`MAX_JSON_DEPTH`] (which includes every cyclic value) and documents of
/// more than [`MAX_JSON_NODES`] values.
pub fn to_json(value: &Value) -> Result<JsonValue> {
    let mut remaining = MAX_JSON_NODES;
    convert(value, 0, &mut remaining)
}

fn convert(value: &Value, depth: usize, remaining: &mut usize) -> Result<JsonValue> {
    if depth > MAX_JSON_DEPTH {
        return Err(Error::Json(format!(
            "value nested deeper than {} levels (cyclic?)",
            MAX_JSON_DEPTH
        )));
    }
    *remaining = remaining.checked_sub(1).ok_or_else(|| {
        Error::Json(format!("document has more than {} values", MAX_JSON_NODES))
    })?;
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Number(n) => JsonValue::Number(number(*n)?),
        Value::String(s) => JsonValue::String(s.to_string()),
        Value::Array(items) => JsonValue::Array(
            items
                .borrow()
                .iter()
                .map(|item| convert(item, depth + 1, remaining))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(entries) => {
            let mut map = Map::new();
            for (key, item) in entries.borrow().iter() {
                map.insert(key.clone(), convert(item, depth + 1, remaining)?);
            }
            JsonValue::Object(map)
        }
        Value::Function(function) => {
            return Err(Error::Json(format!(
                "{} has no JSON representation",
                function.describe()
            )))
        }
    })
}

fn number(n: f64) -> Result<Number> {
    match to_integer(n) {
        Some(i) if i.abs() <= MAX_SAFE_INTEGER => Ok(Number::from(i)),
        _ => Number::from_f64(n)
            .ok_or_else(|| Error::Json(format!("{} has no JSON representation", n))),
    }
}
