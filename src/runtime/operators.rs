//! Binary and unary operator semantics
//!
//! Errors returned here carry no location; the evaluator attaches the span
//! of the operator expression.

use indexmap::IndexMap;

use super::value::{to_integer, Value};
use crate::error::{EvalErrorKind, EvalResult, EvaluationError};
use crate::parser::{BinaryOp, UnaryOp};

/// Largest string (in bytes) or array (in elements) an operation may build
pub const MAX_SEQUENCE_LENGTH: usize = 16 * 1024 * 1024;

/// Accepts a computed result length (None when it overflowed) within [`MAX_SEQUENCE_LENGTH`]
pub fn check_length(length: Option<usize>) -> EvalResult<usize> {
    match length {
        Some(length) if length <= MAX_SEQUENCE_LENGTH => Ok(length),
        _ => Err(EvaluationError::new(EvalErrorKind::SizeLimitExceeded {
            limit: MAX_SEQUENCE_LENGTH,
        })),
    }
}

/// Copies to make when repeating a sequence of `unit` length `count` times
pub fn repetitions(unit: usize, count: usize) -> EvalResult<usize> {
    check_length(unit.checked_mul(count))?;
    Ok(if unit == 0 { 0 } else { count })
}

fn invalid(op: impl ToString, left: &Value, right: &Value) -> EvaluationError {
    EvaluationError::new(EvalErrorKind::InvalidOperation {
        op: op.to_string(),
        left_type: left.type_name().to_string(),
        right_type: right.type_name().to_string(),
    })
}

/// Applies a binary operator to two evaluated operands
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Mul => multiply(left, right),
        BinaryOp::Sub | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, left, right)
        }
        BinaryOp::Eq => Ok(Value::Boolean(left == right)),
        BinaryOp::NotEq => Ok(Value::Boolean(left != right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => compare(op, left, right),
        BinaryOp::In => contains(left, right),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
            bitwise(op, left, right)
        }
    }
}

/// Applies a unary operator
pub fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Boolean(!value.as_boolean())),
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
        (UnaryOp::BitNot, Value::Number(n)) => match to_integer(*n) {
            Some(i) => Ok(Value::Number(!i as f64)),
            None => Err(EvaluationError::type_error("integer", format!("number {}", n))),
        },
        (op, value) => {
            let symbol = match op {
                UnaryOp::Neg => "unary -",
                UnaryOp::Plus => "unary +",
                UnaryOp::Not => "!",
                UnaryOp::BitNot => "~",
            };
            Err(EvaluationError::type_error(
                format!("number for {}", symbol),
                value.type_name(),
            ))
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

fn add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(a), Value::String(b)) => {
            let length = check_length(a.len().checked_add(b.len()))?;
            let mut joined = String::with_capacity(length);
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::from(joined))
        }
        (Value::Array(a), Value::Array(b)) => {
            check_length(a.borrow().len().checked_add(b.borrow().len()))?;
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::array(items))
        }
        (Value::Object(a), Value::Object(b)) => {
            let right = b.borrow();
            let mut merged: IndexMap<String, Value> = a
                .borrow()
                .iter()
                .filter(|(key, _)| !right.contains_key(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            for (key, value) in right.iter() {
                merged.insert(key.clone(), value.clone());
            }
            Ok(Value::object(merged))
        }
        _ => Err(invalid(BinaryOp::Add, left, right)),
    }
}

/// Non-negative integral repeat count
fn repeat_count(count: f64) -> Option<usize> {
    to_integer(count)
        .filter(|n| *n >= 0)
        .map(|n| n as usize)
}

fn multiply(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (Value::String(s), Value::Number(n)) => match repeat_count(*n) {
            Some(count) => Ok(Value::from(s.repeat(repetitions(s.len(), count)?))),
            None => Err(EvaluationError::type_error(
                "non-negative integer repeat count",
                format!("number {}", n),
            )),
        },
        (Value::Array(items), Value::Number(n)) => match repeat_count(*n) {
            Some(count) => {
                let items = items.borrow();
                let times = repetitions(items.len(), count)?;
                let mut repeated = Vec::with_capacity(items.len() * times);
                for _ in 0..times {
                    repeated.extend(items.iter().cloned());
                }
                Ok(Value::array(repeated))
            }
            None => Err(EvaluationError::type_error(
                "non-negative integer repeat count",
                format!("number {}", n),
            )),
        },
        _ => Err(invalid(BinaryOp::Mul, left, right)),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = match (left, right) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => return Err(invalid(op, left, right)),
    };
    let result = match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => {
            return Err(EvaluationError::new(EvalErrorKind::DivisionByZero))
        }
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Pow => a.powf(b),
        _ => return Err(invalid(op, left, right)),
    };
    Ok(Value::Number(result))
}

// ============================================================================
// Comparison and membership
// ============================================================================

fn compare(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => return Err(invalid(op, left, right)),
    };
    // NaN compares false against everything
    let result = match ordering {
        None => false,
        Some(ordering) => match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::LtEq => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::GtEq => ordering.is_ge(),
            _ => return Err(invalid(op, left, right)),
        },
    };
    Ok(Value::Boolean(result))
}

/// `needle in haystack`: array membership or object key presence
fn contains(needle: &Value, haystack: &Value) -> EvalResult<Value> {
    match (needle, haystack) {
        (_, Value::Array(items)) => Ok(Value::Boolean(items.borrow().contains(needle))),
        (Value::String(key), Value::Object(entries)) => {
            Ok(Value::Boolean(entries.borrow().contains_key(&**key)))
        }
        _ => Err(invalid(BinaryOp::In, needle, haystack)),
    }
}

// ============================================================================
// Bitwise
// ============================================================================

fn bitwise(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (to_integer(*a), to_integer(*b)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(EvaluationError::type_error(
                    format!("integers for {}", op),
                    format!("{} and {}", a, b),
                ))
            }
        },
        _ => return Err(invalid(op, left, right)),
    };
    let result = match op {
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl | BinaryOp::Shr => {
            if !(0..=63).contains(&b) {
                return Err(EvaluationError::runtime(format!(
                    "Shift amount {} is outside 0..=63",
                    b
                )));
            }
            if op == BinaryOp::Shl {
                a << b
            } else {
                a >> b
            }
        }
        _ => return Err(invalid(op, left, right)),
    };
    Ok(Value::Number(result as f64))
}
