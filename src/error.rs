//! Error types for the patch language engine

use crate::lexer::{SourcePos, SourceSpan};
use std::time::Duration;
use thiserror::Error;

fn location(span: &Option<SourceSpan>) -> String {
    match span {
        Some(span) => format!("{}: ", span),
        None => String::new(),
    }
}

fn join_parse_errors(errors: &[ParseError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("{} parse error(s):\n  {}", errors.len(), lines.join("\n  "))
}

/// Malformed token stream; fatal to the lex pass of one file
///
/// **Triggered by:** bad escapes, unterminated or multi-line strings, unknown characters
/// **Example:** `"abc` (missing closing quote)
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{pos}: {message}")]
pub struct LexError {
    /// Error description
    pub message: String,
    /// Where scanning failed
    pub pos: SourcePos,
}

impl LexError {
    /// Creates a lex error at a position
    pub fn new(message: impl Into<String>, pos: SourcePos) -> Self {
        LexError {
            message: message.into(),
            pos,
        }
    }
}

/// Grammar violation; recoverable at statement granularity
///
/// **Triggered by:** unexpected tokens, duplicate parameters, assignment to a non-reference,
/// unknown metadata keys
/// **Example:** `1 = 2;`
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}{}", location(.span), .message)]
pub struct ParseError {
    /// Error description
    pub message: String,
    /// Offending source range
    pub span: Option<SourceSpan>,
}

impl ParseError {
    /// Creates a parse error at a span
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        ParseError {
            message: message.into(),
            span: Some(span),
        }
    }
}

/// What went wrong during evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    /// Operation expecting one kind of value but receiving another
    ///
    /// **Example:** `if (-"x") {}`
    #[error("Type error: expected {expected}, got {got}")]
    TypeError {
        /// Expected type
        expected: String,
        /// Actual type
        got: String,
    },

    /// Reference to an undeclared `$variable`
    #[error("Undefined variable: ${name}")]
    UndefinedVariable {
        /// Variable name
        name: String,
    },

    /// Bare identifier that is neither a root property nor a visible variable
    #[error("Undefined name '{name}': not a property of the root object and not a variable")]
    UndefinedName {
        /// Identifier
        name: String,
    },

    /// Object key that does not exist
    #[error("No such key '{key}'")]
    MissingKey {
        /// Requested key
        key: String,
    },

    /// Array or string index outside the current bounds
    ///
    /// **Example:** `[1, 2][2]`
    #[error("Index out of bounds: {index} for length {length}")]
    IndexOutOfBounds {
        /// Requested index (before negative-index adjustment)
        index: i64,
        /// Current length
        length: usize,
    },

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Operator applied to unsupported operand kinds
    ///
    /// **Example:** `"a" - 1`
    #[error("Invalid operation: {op} on types {left_type} and {right_type}")]
    InvalidOperation {
        /// Operator
        op: String,
        /// Left operand type
        left_type: String,
        /// Right operand type
        right_type: String,
    },

    /// Attempt to call a non-function value
    #[error("Value is not callable: {type_name}")]
    NotCallable {
        /// Type of non-callable value
        type_name: String,
    },

    /// Call with the wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {got}")]
    ArityMismatch {
        /// Function description
        function: String,
        /// Accepted argument counts
        expected: String,
        /// Supplied argument count
        got: usize,
    },

    /// Assignment or deletion of a `val` binding
    #[error("Cannot modify immutable variable: ${name}")]
    ImmutableAssignment {
        /// Variable name
        name: String,
    },

    /// Declaration of a name already visible in the scope chain
    #[error("Variable already declared: ${name}")]
    DuplicateVariable {
        /// Variable name
        name: String,
    },

    /// Library that (transitively) imports itself
    #[error("Recursive import detected: {chain}")]
    CyclicImport {
        /// Import chain, outermost first
        chain: String,
    },

    /// Library no locator knows about
    #[error("Unknown library: {name}")]
    UnknownLibrary {
        /// Library name
        name: String,
    },

    /// Failure reported by a native function
    #[error("Error in native function {function}: {reason}")]
    NativeError {
        /// Qualified function name
        function: String,
        /// Failure reason
        reason: String,
    },

    /// String or array that would grow past the size limit
    ///
    /// **Example:** `"ab" * 10000000000`
    #[error("Result would exceed the size limit of {limit} elements")]
    SizeLimitExceeded {
        /// Largest allowed length (bytes for strings, elements for arrays)
        limit: usize,
    },

    /// Too many nested function calls
    #[error("Maximum call depth of {limit} exceeded")]
    CallDepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Wrapper added when an error escapes a function call
    #[error("Error in call to {function}")]
    InCall {
        /// Function description
        function: String,
    },

    /// Wrapper added when an error escapes an imported library
    #[error("Error while loading library {name}")]
    InLibrary {
        /// Library name
        name: String,
    },

    /// Placeholder statement left by parser error recovery
    #[error("Cannot execute a statement that failed to parse")]
    UnparsedStatement,

    /// General runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Evaluation failure with an optional location and an optional cause chain
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}{}", location(.span), .kind)]
pub struct EvaluationError {
    /// What went wrong
    pub kind: EvalErrorKind,
    /// Where it went wrong
    pub span: Option<SourceSpan>,
    /// Inner failure this one wraps
    #[source]
    pub cause: Option<Box<EvaluationError>>,
}

impl EvaluationError {
    /// Creates an error without location
    pub fn new(kind: EvalErrorKind) -> Self {
        EvaluationError {
            kind,
            span: None,
            cause: None,
        }
    }

    /// Creates an error at a location
    pub fn at(kind: EvalErrorKind, span: &SourceSpan) -> Self {
        EvaluationError {
            kind,
            span: Some(span.clone()),
            cause: None,
        }
    }

    /// Create a runtime error with a message
    pub fn runtime(msg: impl Into<String>) -> Self {
        EvaluationError::new(EvalErrorKind::Runtime(msg.into()))
    }

    /// Create a type error
    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        EvaluationError::new(EvalErrorKind::TypeError {
            expected: expected.into(),
            got: got.into(),
        })
    }

    /// Attaches a location unless one is already present
    pub fn or_at(mut self, span: &SourceSpan) -> Self {
        if self.span.is_none() {
            self.span = Some(span.clone());
        }
        self
    }

    /// Wraps `self` as the cause of a new error
    pub fn wrap(self, kind: EvalErrorKind, span: &SourceSpan) -> Self {
        EvaluationError {
            kind,
            span: Some(span.clone()),
            cause: Some(Box::new(self)),
        }
    }

    /// Innermost error of the cause chain
    pub fn root_cause(&self) -> &EvaluationError {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current
    }

    /// Message including every cause, one per line
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut current = &self.cause;
        while let Some(cause) = current {
            message.push_str("\n  caused by: ");
            message.push_str(&cause.to_string());
            current = &cause.cause;
        }
        message
    }
}

/// Engine-wide error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Source could not be tokenized
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Source could not be parsed; every error found is listed
    #[error("{}", join_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// Script failed while running
    #[error("{}", .0.full_message())]
    Evaluation(#[from] EvaluationError),

    /// Patch application exceeded its wall-clock budget
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Patch worker died without reporting a result
    #[error("Patch worker panicked")]
    WorkerPanicked,

    /// Patch worker thread could not be started
    #[error("Failed to start patch worker: {0}")]
    Spawn(String),

    /// Document could not be converted between JSON and script values
    #[error("JSON error: {0}")]
    Json(String),
}

impl Error {
    /// Parse errors of a failed parse, empty for other kinds
    pub fn parse_errors(&self) -> &[ParseError] {
        match self {
            Error::Parse(errors) => errors,
            _ => &[],
        }
    }

    /// True when the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// Result type for evaluation
pub type EvalResult<T> = std::result::Result<T, EvaluationError>;

/// Result type for parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
