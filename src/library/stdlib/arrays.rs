//! `arrays` - array functions, also reachable as methods on array values
//!
//! `push`, `pop`, `insert`, `remove_at` and `fill` mutate their argument;
//! `slice`, `reverse`, `sort`, `map` and `filter` return new arrays.
//! Callbacks always run over a snapshot of the array, so a callback may
//! modify the array it is iterating.

use std::cmp::Ordering;

use crate::error::{EvalResult, EvaluationError};
use crate::library::{CallContext, Library};
use crate::runtime::operators::check_length;
use crate::runtime::{resolve_index, Value};

/// The `arrays` library
pub static LIBRARY: Library = Library {
    name: "arrays",
    constants: &[],
    functions: &[
        native!("arrays", "length", (Array) => pure length),
        native!("arrays", "push", (Array, Any) => pure push),
        native!("arrays", "pop", (Array) => pure pop),
        native!("arrays", "insert", (Array, Integer, Any) => pure insert),
        native!("arrays", "remove_at", (Array, Integer) => pure remove_at),
        native!("arrays", "index_of", (Array, Any) => pure index_of),
        native!("arrays", "contains", (Array, Any) => pure contains),
        native!(
            "arrays",
            "slice",
            (Array, Integer) => pure slice_from,
            (Array, Integer, Integer) => pure slice
        ),
        native!("arrays", "reverse", (Array) => pure reverse),
        native!("arrays", "sort", (Array) => pure sort, (Array, Function) => ctx sort_by),
        native!("arrays", "map", (Array, Function) => ctx map),
        native!("arrays", "filter", (Array, Function) => ctx filter),
        native!("arrays", "find", (Array, Function) => ctx find),
        native!("arrays", "any", (Array, Function) => ctx any),
        native!("arrays", "all", (Array, Function) => ctx all),
        native!("arrays", "join", (Array, String) => pure join),
        native!("arrays", "fill", (Array, Any) => pure fill),
    ],
};

/// Copy of the elements, safe to hold while script code runs
fn snapshot(array: &Value) -> EvalResult<Vec<Value>> {
    Ok(array.as_array()?.borrow().clone())
}

// ============================================================================
// Mutation
// ============================================================================

fn length(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(args[0].as_array()?.borrow().len() as f64))
}

/// Appends and returns the new length
fn push(args: &[Value]) -> EvalResult<Value> {
    let mut items = args[0].as_array()?.borrow_mut();
    items.push(args[1].clone());
    Ok(Value::Number(items.len() as f64))
}

fn pop(args: &[Value]) -> EvalResult<Value> {
    args[0]
        .as_array()?
        .borrow_mut()
        .pop()
        .ok_or_else(|| EvaluationError::runtime("Cannot pop from an empty array"))
}

fn insert(args: &[Value]) -> EvalResult<Value> {
    let mut items = args[0].as_array()?.borrow_mut();
    let index = resolve_index(args[1].as_integer()?, items.len(), true)?;
    items.insert(index, args[2].clone());
    Ok(Value::Null)
}

/// Removes and returns the element at an index
fn remove_at(args: &[Value]) -> EvalResult<Value> {
    let mut items = args[0].as_array()?.borrow_mut();
    let index = resolve_index(args[1].as_integer()?, items.len(), false)?;
    Ok(items.remove(index))
}

/// Replaces every element with the value and returns the array
fn fill(args: &[Value]) -> EvalResult<Value> {
    for item in args[0].as_array()?.borrow_mut().iter_mut() {
        *item = args[1].clone();
    }
    Ok(args[0].clone())
}

// ============================================================================
// Queries and copies
// ============================================================================

fn index_of(args: &[Value]) -> EvalResult<Value> {
    let items = args[0].as_array()?.borrow();
    let index = match items.iter().position(|item| *item == args[1]) {
        Some(i) => i as f64,
        None => -1.0,
    };
    Ok(Value::Number(index))
}

fn contains(args: &[Value]) -> EvalResult<Value> {
    let items = args[0].as_array()?.borrow();
    Ok(Value::Boolean(items.iter().any(|item| *item == args[1])))
}

fn slice_range(array: &Value, start: i64, end: Option<i64>) -> EvalResult<Value> {
    let items = array.as_array()?.borrow();
    let start = resolve_index(start, items.len(), true)?;
    let end = match end {
        Some(end) => resolve_index(end, items.len(), true)?,
        None => items.len(),
    };
    if start > end {
        return Err(EvaluationError::runtime(format!(
            "Start {} is after end {}",
            start, end
        )));
    }
    Ok(Value::array(items[start..end].to_vec()))
}

fn slice_from(args: &[Value]) -> EvalResult<Value> {
    slice_range(&args[0], args[1].as_integer()?, None)
}

fn slice(args: &[Value]) -> EvalResult<Value> {
    slice_range(&args[0], args[1].as_integer()?, Some(args[2].as_integer()?))
}

fn reverse(args: &[Value]) -> EvalResult<Value> {
    let mut items = snapshot(&args[0])?;
    items.reverse();
    Ok(Value::array(items))
}

fn join(args: &[Value]) -> EvalResult<Value> {
    let separator = args[1].as_str()?;
    let items = args[0].as_array()?.borrow();
    let mut joined = String::new();
    for (i, item) in items.iter().enumerate() {
        let part = item.to_display_string();
        let glue = if i > 0 { separator.len() } else { 0 };
        check_length(
            joined
                .len()
                .checked_add(glue)
                .and_then(|n| n.checked_add(part.len())),
        )?;
        if i > 0 {
            joined.push_str(separator);
        }
        joined.push_str(&part);
    }
    Ok(Value::string(joined))
}

// ============================================================================
// Sorting
// ============================================================================

/// Natural order: all numbers or all strings
fn sort(args: &[Value]) -> EvalResult<Value> {
    let mut items = snapshot(&args[0])?;
    let mut failure = None;
    items.sort_by(|a, b| match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => {
            failure.get_or_insert_with(|| {
                EvaluationError::runtime(format!(
                    "Cannot compare {} with {}",
                    a.type_name(),
                    b.type_name()
                ))
            });
            Ordering::Equal
        }
    });
    match failure {
        Some(error) => Err(error),
        None => Ok(Value::array(items)),
    }
}

/// Order given by a comparator returning a negative, zero or positive number
fn sort_by(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let mut items = snapshot(&args[0])?;
    let comparator = &args[1];
    let mut failure: Option<EvaluationError> = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let order = call
            .call(comparator, vec![a.clone(), b.clone()])
            .and_then(|result| result.as_number());
        match order {
            Ok(n) if n < 0.0 => Ordering::Less,
            Ok(n) if n > 0.0 => Ordering::Greater,
            Ok(_) => Ordering::Equal,
            Err(error) => {
                failure = Some(error);
                Ordering::Equal
            }
        }
    });
    match failure {
        Some(error) => Err(error),
        None => Ok(Value::array(items)),
    }
}

// ============================================================================
// Callbacks
// ============================================================================

fn map(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let mapped = snapshot(&args[0])?
        .into_iter()
        .map(|item| call.call(&args[1], vec![item]))
        .collect::<EvalResult<Vec<Value>>>()?;
    Ok(Value::array(mapped))
}

fn filter(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    let mut kept = Vec::new();
    for item in snapshot(&args[0])? {
        if call.call(&args[1], vec![item.clone()])?.as_boolean() {
            kept.push(item);
        }
    }
    Ok(Value::array(kept))
}

/// First element the predicate accepts, or null
fn find(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    for item in snapshot(&args[0])? {
        if call.call(&args[1], vec![item.clone()])?.as_boolean() {
            return Ok(item);
        }
    }
    Ok(Value::Null)
}

fn any(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    for item in snapshot(&args[0])? {
        if call.call(&args[1], vec![item])?.as_boolean() {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn all(call: &CallContext<'_>, args: &[Value]) -> EvalResult<Value> {
    for item in snapshot(&args[0])? {
        if !call.call(&args[1], vec![item])?.as_boolean() {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Value {
        Value::array(values.iter().map(|n| Value::Number(*n)).collect())
    }

    #[test]
    fn test_push_pop() {
        let array = nums(&[1.0]);
        assert_eq!(push(&[array.clone(), Value::Null]).unwrap(), Value::Number(2.0));
        assert_eq!(pop(&[array.clone()]).unwrap(), Value::Null);
        assert_eq!(pop(&[array.clone()]).unwrap(), Value::Number(1.0));
        assert!(pop(&[array]).is_err());
    }

    #[test]
    fn test_insert_and_remove() {
        let array = nums(&[1.0, 3.0]);
        insert(&[array.clone(), Value::Number(1.0), Value::Number(2.0)]).unwrap();
        insert(&[array.clone(), Value::Number(3.0), Value::Number(4.0)]).unwrap();
        assert_eq!(array, nums(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(remove_at(&[array.clone(), Value::Number(-1.0)]).unwrap(), Value::Number(4.0));
        assert!(remove_at(&[array, Value::Number(3.0)]).is_err());
    }

    #[test]
    fn test_slice() {
        let array = nums(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            slice(&[array.clone(), Value::Number(1.0), Value::Number(3.0)]).unwrap(),
            nums(&[2.0, 3.0])
        );
        assert_eq!(slice_from(&[array.clone(), Value::Number(-1.0)]).unwrap(), nums(&[4.0]));
        assert_eq!(slice_from(&[array, Value::Number(4.0)]).unwrap(), nums(&[]));
    }

    #[test]
    fn test_natural_sort() {
        let sorted = sort(&[nums(&[3.0, 1.0, 2.0])]).unwrap();
        assert_eq!(sorted, nums(&[1.0, 2.0, 3.0]));
        let mixed = Value::array(vec![Value::Number(1.0), Value::string("a")]);
        assert!(sort(&[mixed]).is_err());
    }

    #[test]
    fn test_reverse_copies() {
        let array = nums(&[1.0, 2.0]);
        assert_eq!(reverse(&[array.clone()]).unwrap(), nums(&[2.0, 1.0]));
        assert_eq!(array, nums(&[1.0, 2.0]));
    }

    #[test]
    fn test_join_and_search() {
        let array = Value::array(vec![Value::string("a"), Value::Number(1.0), Value::Null]);
        assert_eq!(join(&[array.clone(), Value::string("-")]).unwrap(), Value::string("a-1-null"));
        assert_eq!(index_of(&[array.clone(), Value::Null]).unwrap(), Value::Number(2.0));
        assert_eq!(contains(&[array, Value::string("b")]).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_join_is_bounded() {
        let chunk = Value::string("x".repeat(1 << 20));
        let array = Value::array(vec![chunk; 32]);
        let err = join(&[array, Value::string("")]).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::EvalErrorKind::SizeLimitExceeded { .. }
        ));
    }

    #[test]
    fn test_fill() {
        let array = nums(&[1.0, 2.0]);
        fill(&[array.clone(), Value::Number(0.0)]).unwrap();
        assert_eq!(array, nums(&[0.0, 0.0]));
    }
}
