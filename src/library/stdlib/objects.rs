//! `objects` - key/value helpers

use crate::error::{EvalErrorKind, EvalResult, EvaluationError};
use crate::library::Library;
use crate::runtime::Value;

/// The `objects` library
pub static LIBRARY: Library = Library {
    name: "objects",
    constants: &[],
    functions: &[
        native!("objects", "keys", (Object) => pure keys),
        native!("objects", "values", (Object) => pure values),
        native!("objects", "has", (Object, String) => pure has),
        native!("objects", "remove", (Object, String) => pure remove),
        native!("objects", "size", (Object) => pure size),
        native!("objects", "entries", (Object) => pure entries),
        native!("objects", "merge", (Object, Object) => pure merge),
    ],
};

fn keys(args: &[Value]) -> EvalResult<Value> {
    let object = args[0].as_object()?.borrow();
    Ok(Value::array(object.keys().map(Value::string).collect()))
}

fn values(args: &[Value]) -> EvalResult<Value> {
    let object = args[0].as_object()?.borrow();
    Ok(Value::array(object.values().cloned().collect()))
}

fn has(args: &[Value]) -> EvalResult<Value> {
    let key = args[1].as_str()?;
    Ok(Value::Boolean(args[0].as_object()?.borrow().contains_key(key)))
}

/// Removes a key, keeping the order of the rest, and returns its value
fn remove(args: &[Value]) -> EvalResult<Value> {
    let key = args[1].as_str()?;
    args[0]
        .as_object()?
        .borrow_mut()
        .shift_remove(key)
        .ok_or_else(|| {
            EvaluationError::new(EvalErrorKind::MissingKey {
                key: key.to_string(),
            })
        })
}

fn size(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(args[0].as_object()?.borrow().len() as f64))
}

/// `[[key, value], ...]` in insertion order
fn entries(args: &[Value]) -> EvalResult<Value> {
    let object = args[0].as_object()?.borrow();
    let pairs = object
        .iter()
        .map(|(key, value)| Value::array(vec![Value::string(key), value.clone()]))
        .collect();
    Ok(Value::array(pairs))
}

/// Copies every entry of the second object into the first, in place
fn merge(args: &[Value]) -> EvalResult<Value> {
    let source: Vec<(String, Value)> = args[1]
        .as_object()?
        .borrow()
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let mut target = args[0].as_object()?.borrow_mut();
    for (key, value) in source {
        target.insert(key, value);
    }
    drop(target);
    Ok(args[0].clone())
}
