//! Runtime execution of patch programs
//!
//! Values, scopes, operator semantics, the tree-walking evaluator and the
//! JSON bridge used by hosts.

mod context;
mod environment;
mod evaluator;
mod json;
pub mod operators;
mod value;

pub use context::{CallGuard, Closure, Context, DEFAULT_MAX_CALL_DEPTH};
pub use environment::VariableStack;
pub use evaluator::{call_value, Signal};
pub use json::{from_json, to_json, MAX_JSON_DEPTH};
pub use value::{
    format_number, resolve_index, to_integer, ArrayRef, FunctionValue, ObjectRef, Value,
    MAX_EQUALITY_DEPTH,
};
