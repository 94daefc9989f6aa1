//! `strings` - text functions, also reachable as methods on string values
//!
//! Indices count characters, not bytes.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;

use crate::error::{EvalResult, EvaluationError};
use crate::library::Library;
use crate::runtime::operators::{check_length, repetitions};
use crate::runtime::{resolve_index, Value};

/// Compiled patterns kept by [`compile`]
const REGEX_CACHE_SIZE: usize = 64;

lazy_static! {
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> = Mutex::new(LruCache::new(
        NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)
    ));
}

/// The `strings` library
pub static LIBRARY: Library = Library {
    name: "strings",
    constants: &[],
    functions: &[
        native!("strings", "length", (String) => pure length),
        native!("strings", "upper", (String) => pure upper),
        native!("strings", "lower", (String) => pure lower),
        native!("strings", "trim", (String) => pure trim),
        native!("strings", "contains", (String, String) => pure contains),
        native!("strings", "starts_with", (String, String) => pure starts_with),
        native!("strings", "ends_with", (String, String) => pure ends_with),
        native!("strings", "index_of", (String, String) => pure index_of),
        native!(
            "strings",
            "substring",
            (String, Integer) => pure substring_from,
            (String, Integer, Integer) => pure substring
        ),
        native!("strings", "replace", (String, String, String) => pure replace),
        native!("strings", "split", (String, String) => pure split),
        native!("strings", "repeat", (String, Integer) => pure repeat),
        native!("strings", "char_at", (String, Integer) => pure char_at),
        native!("strings", "matches", (String, String) => pure matches),
        native!("strings", "replace_regex", (String, String, String) => pure replace_regex),
    ],
};

// ============================================================================
// Basic operations
// ============================================================================

fn length(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(args[0].as_str()?.chars().count() as f64))
}

fn upper(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::string(args[0].as_str()?.to_uppercase()))
}

fn lower(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::string(args[0].as_str()?.to_lowercase()))
}

fn trim(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::string(args[0].as_str()?.trim()))
}

fn repeat(args: &[Value]) -> EvalResult<Value> {
    let count = args[1].as_integer()?;
    if count < 0 {
        return Err(EvaluationError::runtime(format!(
            "Repeat count must not be negative, got {}",
            count
        )));
    }
    let text = args[0].as_str()?;
    Ok(Value::string(text.repeat(repetitions(text.len(), count as usize)?)))
}

// ============================================================================
// Searching
// ============================================================================

fn contains(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(args[0].as_str()?.contains(args[1].as_str()?)))
}

fn starts_with(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(
        args[0].as_str()?.starts_with(args[1].as_str()?),
    ))
}

fn ends_with(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(args[0].as_str()?.ends_with(args[1].as_str()?)))
}

/// Character index of the first occurrence, or -1
fn index_of(args: &[Value]) -> EvalResult<Value> {
    let text = args[0].as_str()?;
    let index = match text.find(args[1].as_str()?) {
        Some(byte) => text[..byte].chars().count() as f64,
        None => -1.0,
    };
    Ok(Value::Number(index))
}

// ============================================================================
// Slicing
// ============================================================================

fn slice_chars(text: &str, start: i64, end: Option<i64>) -> EvalResult<Value> {
    let chars: Vec<char> = text.chars().collect();
    let start = resolve_index(start, chars.len(), true)?;
    let end = match end {
        Some(end) => resolve_index(end, chars.len(), true)?,
        None => chars.len(),
    };
    if start > end {
        return Err(EvaluationError::runtime(format!(
            "Start {} is after end {}",
            start, end
        )));
    }
    Ok(Value::string(chars[start..end].iter().collect::<String>()))
}

fn substring_from(args: &[Value]) -> EvalResult<Value> {
    slice_chars(args[0].as_str()?, args[1].as_integer()?, None)
}

fn substring(args: &[Value]) -> EvalResult<Value> {
    slice_chars(
        args[0].as_str()?,
        args[1].as_integer()?,
        Some(args[2].as_integer()?),
    )
}

fn char_at(args: &[Value]) -> EvalResult<Value> {
    let text = args[0].as_str()?;
    let length = text.chars().count();
    let index = resolve_index(args[1].as_integer()?, length, false)?;
    let c = text.chars().nth(index).map(String::from).unwrap_or_default();
    Ok(Value::string(c))
}

fn replace(args: &[Value]) -> EvalResult<Value> {
    let (text, from, to) = (args[0].as_str()?, args[1].as_str()?, args[2].as_str()?);
    if from.is_empty() {
        return Err(EvaluationError::runtime("Cannot replace an empty string"));
    }
    if to.len() > from.len() {
        let grown = text
            .matches(from)
            .count()
            .checked_mul(to.len() - from.len())
            .and_then(|extra| extra.checked_add(text.len()));
        check_length(grown)?;
    }
    Ok(Value::string(text.replace(from, to)))
}

fn split(args: &[Value]) -> EvalResult<Value> {
    let text = args[0].as_str()?;
    let separator = args[1].as_str()?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        text.split(separator).map(Value::string).collect()
    };
    Ok(Value::array(parts))
}

// ============================================================================
// Regular expressions
// ============================================================================

/// Compiles `pattern`, reusing a cached program when possible
fn compile(pattern: &str) -> EvalResult<Regex> {
    let mut cache = REGEX_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(pattern).map_err(|e| {
        EvaluationError::type_error("valid regex pattern", format!("invalid regex: {}", e))
    })?;
    cache.put(pattern.to_string(), regex.clone());
    Ok(regex)
}

fn matches(args: &[Value]) -> EvalResult<Value> {
    let regex = compile(args[1].as_str()?)?;
    Ok(Value::Boolean(regex.is_match(args[0].as_str()?)))
}

fn replace_regex(args: &[Value]) -> EvalResult<Value> {
    let regex = compile(args[1].as_str()?)?;
    let replaced = regex.replace_all(args[0].as_str()?, args[2].as_str()?);
    Ok(Value::string(replaced))
}
