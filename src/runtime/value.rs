use std::cell::RefCell;
use std::fmt::{self, Write as _};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::Closure;
use super::operators::MAX_SEQUENCE_LENGTH;
use crate::error::{EvalErrorKind, EvalResult, EvaluationError};
use crate::library::NativeFunction;
use crate::parser::{FunctionDef, ValueKind};

/// Ordered, key-unique mapping shared by reference
pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Ordered sequence shared by reference
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Nesting depth past which rendering stops (guards against cyclic values)
const MAX_RENDER_DEPTH: usize = 64;

/// Nesting depth past which values compare unequal (guards against cyclic values)
pub const MAX_EQUALITY_DEPTH: usize = 512;

/// Runtime value representation
///
/// Objects and arrays are handles: cloning a `Value` clones the handle, so a
/// mutation through one holder is visible to every other holder.
#[derive(Clone)]
pub enum Value {
    /// Ordered key/value mapping (reference-shared)
    Object(ObjectRef),
    /// Ordered sequence (reference-shared)
    Array(ArrayRef),
    /// Immutable text
    String(Rc<str>),
    /// IEEE-754 double
    Number(f64),
    /// Boolean value
    Boolean(bool),
    /// Null value
    Null,
    /// Script or native function
    Function(Rc<FunctionValue>),
}

/// Callable values
pub enum FunctionValue {
    /// User-defined function with the context captured at its definition
    Script {
        /// Parameters and body
        def: Arc<FunctionDef>,
        /// Definition-site context
        closure: Rc<Closure>,
    },
    /// Native library function
    Native(&'static NativeFunction),
    /// Native function with its first argument already supplied
    Bound {
        /// Implicit first argument
        receiver: Value,
        /// Function receiving it
        function: &'static NativeFunction,
    },
}

impl FunctionValue {
    /// Human-readable name used in error messages
    pub fn describe(&self) -> String {
        match self {
            FunctionValue::Script { def, .. } => match &def.name {
                Some(name) => format!("'{}'", name),
                None => "anonymous function".to_string(),
            },
            FunctionValue::Native(function) | FunctionValue::Bound { function, .. } => {
                format!("'{}'", function.qualified_name())
            }
        }
    }
}

impl Value {
    /// Creates a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Creates an array value from a vector of values
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    /// Creates an object value from ordered entries
    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    /// Creates an empty object handle
    pub fn new_object() -> ObjectRef {
        Rc::new(RefCell::new(IndexMap::new()))
    }

    /// Wraps a function
    pub fn function(function: FunctionValue) -> Self {
        Value::Function(Rc::new(function))
    }

    /// Dynamic kind of the value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Object(_) => ValueKind::Object,
            Value::Array(_) => ValueKind::Array,
            Value::String(_) => ValueKind::String,
            Value::Number(_) => ValueKind::Number,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Null => ValueKind::Null,
            Value::Function(_) => ValueKind::Function,
        }
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Boolean coercion: empty string/array/object, zero and null are false
    pub fn as_boolean(&self) -> bool {
        match self {
            Value::Object(o) => !o.borrow().is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0,
            Value::Boolean(b) => *b,
            Value::Null => false,
            Value::Function(_) => true,
        }
    }

    /// Numeric value or a type error
    pub fn as_number(&self) -> EvalResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(EvaluationError::type_error("number", other.type_name())),
        }
    }

    /// Integral numeric value or a type error
    pub fn as_integer(&self) -> EvalResult<i64> {
        let n = self.as_number()?;
        to_integer(n).ok_or_else(|| EvaluationError::type_error("integer", format!("number {}", n)))
    }

    /// String contents or a type error
    pub fn as_str(&self) -> EvalResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvaluationError::type_error("string", other.type_name())),
        }
    }

    /// Boolean payload or a type error (no coercion)
    pub fn as_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(EvaluationError::type_error("boolean", other.type_name())),
        }
    }

    /// Object handle or a type error
    pub fn as_object(&self) -> EvalResult<&ObjectRef> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(EvaluationError::type_error("object", other.type_name())),
        }
    }

    /// Array handle or a type error
    pub fn as_array(&self) -> EvalResult<&ArrayRef> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(EvaluationError::type_error("array", other.type_name())),
        }
    }

    /// Function or a type error
    pub fn as_function(&self) -> EvalResult<&Rc<FunctionValue>> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(EvaluationError::type_error("function", other.type_name())),
        }
    }

    /// Text for logs and string building: strings unquoted, everything else as
    /// displayed. Renderings longer than [`MAX_SEQUENCE_LENGTH`] bytes are cut
    /// short and end in `...`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => {
                let mut out = Capped {
                    text: String::new(),
                    limit: MAX_SEQUENCE_LENGTH,
                };
                if write!(out, "{}", other).is_err() {
                    out.text.push_str("...");
                }
                out.text
            }
        }
    }

    fn render(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        if depth > MAX_RENDER_DEPTH {
            return write!(f, "...");
        }
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "\"{}\"", s.escape_default()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.render(f, depth + 1)?;
                }
                write!(f, "]")
            }
            Value::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": ", key.escape_default())?;
                    value.render(f, depth + 1)?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => write!(f, "<function {}>", function.describe()),
        }
    }
}

/// Integral value of `n`, if it has one representable as i64
pub fn to_integer(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// Text sink that refuses writes past `limit` bytes
struct Capped {
    text: String,
    limit: usize,
}

impl fmt::Write for Capped {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.text.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.text.push_str(s);
        Ok(())
    }
}

/// Checks `index` against `length`, counting negative indices from the end.
/// `length` itself is accepted when `allow_end` is set (slice bounds, insertion points).
pub fn resolve_index(index: i64, length: usize, allow_end: bool) -> EvalResult<usize> {
    let adjusted = if index < 0 {
        index + length as i64
    } else {
        index
    };
    let within = if allow_end {
        adjusted <= length as i64
    } else {
        adjusted < length as i64
    };
    if adjusted < 0 || !within {
        return Err(EvaluationError::new(EvalErrorKind::IndexOutOfBounds {
            index,
            length,
        }));
    }
    Ok(adjusted as usize)
}

/// Integral numbers print without a fractional part
pub fn format_number(n: f64) -> String {
    match to_integer(n) {
        Some(i) => i.to_string(),
        None => n.to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.render(f, 0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.render(f, 0)
    }
}

impl Value {
    fn equals(&self, other: &Value, depth: usize) -> bool {
        if depth > MAX_EQUALITY_DEPTH {
            return false;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y, depth + 1))
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(key, x)| match b.get(key) {
                        Some(y) => x.equals(y, depth + 1),
                        None => false,
                    })
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Structural equality; only values of the same kind are ever equal.
/// Functions compare by identity. Containers nested deeper than
/// [`MAX_EQUALITY_DEPTH`] compare unequal, so distinct cyclic values are
/// unequal rather than endlessly compared.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, 0)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(entries: &[(&str, Value)]) -> Value {
        Value::object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Boolean(true).type_name(), "boolean");
        assert_eq!(Value::Number(2.5).type_name(), "number");
        assert_eq!(Value::string("test").type_name(), "string");
        assert_eq!(Value::array(vec![]).type_name(), "array");
        assert_eq!(obj(&[]).type_name(), "object");
    }

    #[test]
    fn test_boolean_coercion() {
        assert!(!Value::Null.as_boolean());
        assert!(!Value::Boolean(false).as_boolean());
        assert!(!Value::Number(0.0).as_boolean());
        assert!(!Value::string("").as_boolean());
        assert!(!Value::array(vec![]).as_boolean());
        assert!(!obj(&[]).as_boolean());
        assert!(Value::Number(-1.0).as_boolean());
        assert!(Value::string("false").as_boolean());
        assert!(Value::array(vec![Value::Null]).as_boolean());
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::array(vec![Value::Number(1.0), obj(&[("k", "v".into())])]);
        let b = Value::array(vec![Value::Number(1.0), obj(&[("k", "v".into())])]);
        assert_eq!(a, b);
        assert_ne!(Value::Number(0.0), Value::Boolean(false));
        assert_ne!(Value::Null, Value::string("null"));
        // Key order does not take part in equality
        assert_eq!(
            obj(&[("a", 1.0.into()), ("b", 2.0.into())]),
            obj(&[("b", 2.0.into()), ("a", 1.0.into())])
        );
    }

    #[test]
    fn test_handles_are_shared() {
        let a = Value::array(vec![]);
        let alias = a.clone();
        a.as_array().unwrap().borrow_mut().push(Value::Null);
        assert_eq!(alias.as_array().unwrap().borrow().len(), 1);
    }

    #[test]
    fn test_display() {
        let v = obj(&[("n", 3.0.into()), ("s", "x".into()), ("f", 0.5.into())]);
        assert_eq!(v.to_string(), "{\"n\": 3, \"s\": \"x\", \"f\": 0.5}");
        assert_eq!(Value::string("hi").to_display_string(), "hi");
    }

    #[test]
    fn test_display_string_is_capped() {
        let chunk = Value::string("x".repeat(1 << 20));
        let array = Value::array(vec![chunk; 32]);
        let text = array.to_display_string();
        assert!(text.len() <= MAX_SEQUENCE_LENGTH + 3);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_cyclic_display_terminates() {
        let a = Value::array(vec![]);
        a.as_array().unwrap().borrow_mut().push(a.clone());
        assert!(a.to_string().contains("..."));
        // Break the cycle so the test does not leak
        a.as_array().unwrap().borrow_mut().clear();
    }

    #[test]
    fn test_distinct_cycles_compare_unequal() {
        let a = Value::array(vec![]);
        a.as_array().unwrap().borrow_mut().push(a.clone());
        let b = Value::array(vec![]);
        b.as_array().unwrap().borrow_mut().push(b.clone());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        a.as_array().unwrap().borrow_mut().clear();
        b.as_array().unwrap().borrow_mut().clear();
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(-1, 3, false).unwrap(), 2);
        assert_eq!(resolve_index(3, 3, true).unwrap(), 3);
        assert!(resolve_index(3, 3, false).is_err());
        assert!(resolve_index(-4, 3, true).is_err());
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(Value::Number(4.0).as_integer().unwrap(), 4);
        assert!(Value::Number(4.5).as_integer().is_err());
        assert!(Value::string("4").as_integer().is_err());
    }
}
