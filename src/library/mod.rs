//! Native function binding and library resolution
//!
//! Native libraries are static tables: each [`NativeFunction`] lists its
//! overloads, one per argument count, together with the kind every argument
//! must have. [`dispatch`] picks the overload, checks the arguments and wraps
//! whatever the native reports into an evaluation error.
//!
//! `import` goes through [`Libraries`], an ordered list of
//! [`LibraryLocator`]s: the native tables first, then any script libraries
//! the host registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;

use crate::error::{EvalErrorKind, EvalResult, EvaluationError, Result};
use crate::lexer::SourceSpan;
use crate::parser::{parse_source, Program};
use crate::runtime::{call_value, Context, FunctionValue, ObjectRef, Value};

/// Declares the overload list of a native function:
/// `native!("lib", "name", (Number, Number) => pure f, (Any) => ctx g)`
macro_rules! native {
    ($lib:literal, $name:literal, $( ($($param:ident),*) => $mode:ident $f:path ),+ $(,)?) => {
        $crate::library::NativeFunction {
            library: $lib,
            name: $name,
            overloads: &[$($crate::library::Overload {
                params: &[$($crate::library::ParamKind::$param),*],
                call: native_call!($mode $f),
            }),+],
        }
    };
}

macro_rules! native_call {
    (pure $f:path) => {
        $crate::library::NativeCall::Pure($f)
    };
    (ctx $f:path) => {
        $crate::library::NativeCall::Contextual($f)
    };
}

pub mod stdlib;

/// Native function without access to the caller
pub type PureFn = fn(&[Value]) -> EvalResult<Value>;

/// Native function that also receives the caller's context
pub type ContextFn = fn(&CallContext<'_>, &[Value]) -> EvalResult<Value>;

/// Argument kind a native parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value
    Any,
    /// Number
    Number,
    /// Number without fractional part
    Integer,
    /// String
    String,
    /// Boolean
    Boolean,
    /// Array
    Array,
    /// Object
    Object,
    /// Script or native function
    Function,
}

impl ParamKind {
    /// Whether `value` may be passed for this parameter
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ParamKind::Any, _) => true,
            (ParamKind::Number, Value::Number(_)) => true,
            (ParamKind::Integer, Value::Number(n)) => crate::runtime::to_integer(*n).is_some(),
            (ParamKind::String, Value::String(_)) => true,
            (ParamKind::Boolean, Value::Boolean(_)) => true,
            (ParamKind::Array, Value::Array(_)) => true,
            (ParamKind::Object, Value::Object(_)) => true,
            (ParamKind::Function, Value::Function(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ParamKind::Any => "any value",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Function => "function",
        };
        f.write_str(name)
    }
}

/// How an overload is invoked
#[derive(Clone, Copy)]
pub enum NativeCall {
    /// Receives the arguments only
    Pure(PureFn),
    /// Receives the call context first; it does not count toward arity
    Contextual(ContextFn),
}

/// One arity of a native function
pub struct Overload {
    /// Expected argument kinds
    pub params: &'static [ParamKind],
    /// Implementation
    pub call: NativeCall,
}

/// Native function exposed to scripts
pub struct NativeFunction {
    /// Owning library
    pub library: &'static str,
    /// Script-visible name
    pub name: &'static str,
    /// Overloads, at most one per argument count
    pub overloads: &'static [Overload],
}

impl NativeFunction {
    /// `library.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.library, self.name)
    }

    /// Overload taking `count` arguments
    pub fn overload(&self, count: usize) -> Option<&'static Overload> {
        self.overloads.iter().find(|o| o.params.len() == count)
    }

    /// Accepted argument counts, e.g. "2 or 3"
    pub fn arities(&self) -> String {
        let counts: Vec<String> = self
            .overloads
            .iter()
            .map(|o| o.params.len().to_string())
            .collect();
        counts.join(" or ")
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NativeFunction({}/{})", self.qualified_name(), self.arities())
    }
}

/// Constant exposed by a native library
#[derive(Debug, Clone, Copy)]
pub enum Constant {
    /// Number constant
    Number(f64),
    /// String constant
    String(&'static str),
}

impl Constant {
    fn to_value(self) -> Value {
        match self {
            Constant::Number(n) => Value::Number(n),
            Constant::String(s) => Value::string(s),
        }
    }
}

/// Statically registered native library
pub struct Library {
    /// Name used by `import`
    pub name: &'static str,
    /// Functions in the library
    pub functions: &'static [NativeFunction],
    /// Constants in the library
    pub constants: &'static [(&'static str, Constant)],
}

impl Library {
    /// Function by script-visible name
    pub fn function(&'static self, name: &str) -> Option<&'static NativeFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Copies every constant and function into `out`
    pub fn populate(&'static self, out: &ObjectRef) {
        let mut out = out.borrow_mut();
        for (name, constant) in self.constants {
            out.insert(name.to_string(), constant.to_value());
        }
        for function in self.functions {
            out.insert(
                function.name.to_string(),
                Value::function(FunctionValue::Native(function)),
            );
        }
    }
}

lazy_static! {
    /// Every native library by name
    pub static ref NATIVE_LIBRARIES: HashMap<&'static str, &'static Library> = stdlib::LIBRARIES
        .iter()
        .map(|library| (library.name, *library))
        .collect();
}

/// Caller environment handed to contextual natives
pub struct CallContext<'a> {
    /// Context of the call site
    pub context: &'a Context,
    /// Span of the call expression
    pub span: &'a SourceSpan,
}

impl CallContext<'_> {
    /// Calls a script or native function from native code
    pub fn call(&self, function: &Value, args: Vec<Value>) -> EvalResult<Value> {
        call_value(function, args, self.context, self.span)
    }
}

/// Calls a native function: resolves the overload by argument count, checks
/// argument kinds and wraps failures
pub fn dispatch(
    function: &'static NativeFunction,
    args: Vec<Value>,
    context: &Context,
    span: &SourceSpan,
) -> EvalResult<Value> {
    let overload = function.overload(args.len()).ok_or_else(|| {
        EvaluationError::at(
            EvalErrorKind::ArityMismatch {
                function: format!("'{}'", function.qualified_name()),
                expected: function.arities(),
                got: args.len(),
            },
            span,
        )
    })?;

    for (index, (kind, arg)) in overload.params.iter().zip(&args).enumerate() {
        if !kind.accepts(arg) {
            return Err(EvaluationError::at(
                EvalErrorKind::TypeError {
                    expected: format!(
                        "{} for argument {} of {}",
                        kind,
                        index + 1,
                        function.qualified_name()
                    ),
                    got: arg.type_name().to_string(),
                },
                span,
            ));
        }
    }

    let result = match overload.call {
        NativeCall::Pure(f) => f(&args),
        NativeCall::Contextual(f) => f(&CallContext { context, span }, &args),
    };
    result.map_err(|error| {
        if error.span.is_none() && error.cause.is_none() {
            let reason = match error.kind {
                EvalErrorKind::Runtime(message) => message,
                other => other.to_string(),
            };
            EvaluationError::at(
                EvalErrorKind::NativeError {
                    function: function.qualified_name(),
                    reason,
                },
                span,
            )
        } else {
            error.wrap(
                EvalErrorKind::InCall {
                    function: format!("'{}'", function.qualified_name()),
                },
                span,
            )
        }
    })
}

/// Native method reachable as `receiver.name`, for strings and arrays
pub fn method(receiver: &Value, name: &str) -> Option<&'static NativeFunction> {
    let library: &'static Library = match receiver {
        Value::String(_) => &stdlib::strings::LIBRARY,
        Value::Array(_) => &stdlib::arrays::LIBRARY,
        _ => return None,
    };
    library.function(name)
}

/// Resolves library names for `import`
pub trait LibraryLocator: Send + Sync {
    /// Fills `out` with library `name`. Returns false when this locator does
    /// not know the name; fails when the library exists but cannot be loaded.
    fn locate(
        &self,
        name: &str,
        out: &ObjectRef,
        context: &Context,
        span: &SourceSpan,
    ) -> EvalResult<bool>;
}

/// Locator over [`NATIVE_LIBRARIES`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeLibraries;

impl LibraryLocator for NativeLibraries {
    fn locate(
        &self,
        name: &str,
        out: &ObjectRef,
        _context: &Context,
        _span: &SourceSpan,
    ) -> EvalResult<bool> {
        match NATIVE_LIBRARIES.get(name) {
            Some(library) => {
                library.populate(out);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Parsed library scripts, shared between worker threads
///
/// Loading a library runs its program with the library object as root, so
/// `name = ...` at the library's top level exports `name`.
#[derive(Debug, Default)]
pub struct ScriptLibraries {
    programs: DashMap<String, Arc<Program>>,
}

impl ScriptLibraries {
    /// Creates an empty set
    pub fn new() -> Self {
        ScriptLibraries::default()
    }

    /// Registers an already parsed library
    pub fn insert(&self, name: impl Into<String>, program: Arc<Program>) {
        self.programs.insert(name.into(), program);
    }

    /// Parses `source` and registers it under `name`
    pub fn load(&self, name: &str, source: &str) -> Result<()> {
        let program = parse_source(source, name)?;
        self.insert(name, Arc::new(program));
        Ok(())
    }

    /// Whether a library of this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Number of registered libraries
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl LibraryLocator for ScriptLibraries {
    fn locate(
        &self,
        name: &str,
        out: &ObjectRef,
        context: &Context,
        _span: &SourceSpan,
    ) -> EvalResult<bool> {
        // Clone out of the map so no shard lock is held while the library runs
        let program = match self.programs.get(name) {
            Some(entry) => entry.value().clone(),
            None => return Ok(false),
        };
        program.execute(&context.isolated(out.clone()))?;
        Ok(true)
    }
}

/// Ordered list of library locators
#[derive(Clone, Default)]
pub struct Libraries {
    locators: Vec<Arc<dyn LibraryLocator>>,
}

impl Libraries {
    /// Native libraries only
    pub fn standard() -> Self {
        let mut libraries = Libraries::default();
        libraries.push(Arc::new(NativeLibraries));
        libraries
    }

    /// Native libraries, then `scripts`
    pub fn with_scripts(scripts: Arc<ScriptLibraries>) -> Self {
        let mut libraries = Libraries::standard();
        libraries.push(scripts);
        libraries
    }

    /// Appends a locator; earlier locators win
    pub fn push(&mut self, locator: Arc<dyn LibraryLocator>) {
        self.locators.push(locator);
    }

    /// Asks each locator in turn
    pub fn locate(
        &self,
        name: &str,
        out: &ObjectRef,
        context: &Context,
        span: &SourceSpan,
    ) -> EvalResult<bool> {
        for locator in &self.locators {
            if locator.locate(name, out, context, span)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl fmt::Debug for Libraries {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Libraries")
            .field("locators", &self.locators.len())
            .finish()
    }
}
