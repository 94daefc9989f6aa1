//! `math` - numeric functions and constants

use crate::error::{EvalResult, EvaluationError};
use crate::library::{Constant, Library};
use crate::runtime::Value;

/// The `math` library
pub static LIBRARY: Library = Library {
    name: "math",
    constants: &[
        ("PI", Constant::Number(std::f64::consts::PI)),
        ("E", Constant::Number(std::f64::consts::E)),
        ("INFINITY", Constant::Number(f64::INFINITY)),
    ],
    functions: &[
        native!("math", "abs", (Number) => pure abs),
        native!("math", "sqrt", (Number) => pure sqrt),
        native!("math", "pow", (Number, Number) => pure pow),
        native!("math", "floor", (Number) => pure floor),
        native!("math", "ceil", (Number) => pure ceil),
        native!("math", "round", (Number) => pure round),
        native!("math", "trunc", (Number) => pure trunc),
        native!("math", "sign", (Number) => pure sign),
        native!("math", "min", (Number, Number) => pure min, (Array) => pure min_of),
        native!("math", "max", (Number, Number) => pure max, (Array) => pure max_of),
        native!("math", "clamp", (Number, Number, Number) => pure clamp),
        native!("math", "sin", (Number) => pure sin),
        native!("math", "cos", (Number) => pure cos),
        native!("math", "tan", (Number) => pure tan),
        native!("math", "log", (Number) => pure log),
        native!("math", "exp", (Number) => pure exp),
    ],
};

fn unary(args: &[Value], f: fn(f64) -> f64) -> EvalResult<Value> {
    Ok(Value::Number(f(args[0].as_number()?)))
}

fn abs(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::abs)
}

fn sqrt(args: &[Value]) -> EvalResult<Value> {
    let n = args[0].as_number()?;
    if n < 0.0 {
        return Err(EvaluationError::runtime(format!(
            "Cannot take the square root of {}",
            n
        )));
    }
    Ok(Value::Number(n.sqrt()))
}

fn pow(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(args[0].as_number()?.powf(args[1].as_number()?)))
}

fn floor(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::floor)
}

fn ceil(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::ceil)
}

fn round(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::round)
}

fn trunc(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::trunc)
}

fn sign(args: &[Value]) -> EvalResult<Value> {
    let n = args[0].as_number()?;
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(Value::Number(sign))
}

fn min(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(args[0].as_number()?.min(args[1].as_number()?)))
}

fn max(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(args[0].as_number()?.max(args[1].as_number()?)))
}

/// Numbers of a non-empty array
fn numbers(array: &Value) -> EvalResult<Vec<f64>> {
    let items = array.as_array()?.borrow();
    if items.is_empty() {
        return Err(EvaluationError::runtime("Array is empty"));
    }
    items.iter().map(Value::as_number).collect()
}

fn min_of(args: &[Value]) -> EvalResult<Value> {
    let numbers = numbers(&args[0])?;
    Ok(Value::Number(numbers.into_iter().fold(f64::INFINITY, f64::min)))
}

fn max_of(args: &[Value]) -> EvalResult<Value> {
    let numbers = numbers(&args[0])?;
    Ok(Value::Number(
        numbers.into_iter().fold(f64::NEG_INFINITY, f64::max),
    ))
}

fn clamp(args: &[Value]) -> EvalResult<Value> {
    let (value, low, high) = (
        args[0].as_number()?,
        args[1].as_number()?,
        args[2].as_number()?,
    );
    if low > high {
        return Err(EvaluationError::runtime(format!(
            "Lower bound {} is greater than upper bound {}",
            low, high
        )));
    }
    Ok(Value::Number(value.max(low).min(high)))
}

fn sin(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::sin)
}

fn cos(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::cos)
}

fn tan(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::tan)
}

fn log(args: &[Value]) -> EvalResult<Value> {
    let n = args[0].as_number()?;
    if n <= 0.0 {
        return Err(EvaluationError::runtime(format!(
            "Logarithm of non-positive number {}",
            n
        )));
    }
    Ok(Value::Number(n.ln()))
}

fn exp(args: &[Value]) -> EvalResult<Value> {
    unary(args, f64::exp)
}
