use super::metadata::Metadata;
use crate::lexer::SourceSpan;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Complete parsed script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    /// Values of the `@key value;` header tags
    pub metadata: Metadata,
    /// Top-level statements in the program
    pub statements: Vec<Statement>,
}

/// Statement node; executed for effect only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    /// What the statement does
    pub kind: StatementKind,
    /// Source range of the whole statement
    pub span: SourceSpan,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StatementKind {
    /// `{ ... }` - runs its statements in a new scope
    Block(Vec<Statement>),

    /// `expr;`
    Expression(Expression),

    /// If statement
    If {
        /// Condition expression to evaluate
        condition: Expression,
        /// Statement to execute if condition is true
        then_branch: Box<Statement>,
        /// Optional statement to execute if condition is false
        else_branch: Option<Box<Statement>>,
    },

    /// While loop
    While {
        /// Loop condition expression
        condition: Expression,
        /// Loop body
        body: Box<Statement>,
    },

    /// `for (init; condition; update) body`
    For {
        /// Runs once, in the loop's own scope
        init: Option<Box<Statement>>,
        /// Checked before every iteration; absent means true
        condition: Option<Expression>,
        /// Runs after every iteration
        update: Option<Expression>,
        /// Loop body
        body: Box<Statement>,
    },

    /// `foreach (name in iterable) body`
    Foreach {
        /// Loop variable name
        variable: String,
        /// Array or object to iterate over
        iterable: Expression,
        /// Loop body
        body: Box<Statement>,
    },

    /// `var name = value;` or `val name = value;`
    VarDecl {
        /// Name of the variable
        name: String,
        /// `var` (true) or `val` (false)
        mutable: bool,
        /// Initial value
        value: Expression,
    },

    /// `delete target;`
    Delete(Reference),

    /// `return value?;`
    Return(Option<Expression>),

    /// `break;`
    Break,

    /// `continue;`
    Continue,

    /// `function name(params) { ... }`
    FunctionDecl(Arc<FunctionDef>),

    /// `import "library" as name;`
    Import {
        /// Library name as written
        library: String,
        /// Variable the library object is bound to
        binding: String,
    },

    /// `apply (target) action` - runs `action` with `target` as root
    Apply {
        /// Expression producing the new root object
        target: Expression,
        /// Statement to run against it
        action: Box<Statement>,
    },

    /// Placeholder for a statement that failed to parse
    Error(String),

    /// Stray `;`
    NoOp,
}

/// Expression node; evaluates to exactly one value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    /// What the expression computes
    pub kind: ExpressionKind,
    /// Source range of the whole expression
    pub span: SourceSpan,
}

impl Expression {
    /// Creates an expression node
    pub fn new(kind: ExpressionKind, span: SourceSpan) -> Self {
        Expression { kind, span }
    }

    /// The reference this expression denotes, if it is one
    pub fn into_reference(self) -> Result<Reference, Expression> {
        match self.kind {
            ExpressionKind::Reference(reference) => Ok(reference),
            _ => Err(self),
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExpressionKind {
    /// Literal value
    Literal(Literal),

    /// Variable, bare identifier, property or index access
    Reference(Reference),

    /// Explicit root access (`this`)
    Root,

    /// `[a, b, ...]`
    ArrayInit(Vec<Expression>),

    /// `{ key: value, ... }`
    ObjectInit(Vec<(String, Expression)>),

    /// Unary operation expression
    Unary {
        /// Unary operator to apply
        op: UnaryOp,
        /// Operand expression
        operand: Box<Expression>,
    },

    /// Binary operation expression
    Binary {
        /// Binary operator to apply
        op: BinaryOp,
        /// Left operand expression
        left: Box<Expression>,
        /// Right operand expression
        right: Box<Expression>,
    },

    /// Short-circuiting `&&` / `||`
    Logical {
        /// Logical operator
        op: LogicalOp,
        /// Always evaluated
        left: Box<Expression>,
        /// Evaluated only when `left` does not decide the result
        right: Box<Expression>,
    },

    /// `target = value` or `target op= value`
    Assign {
        /// Where the result is stored
        target: Reference,
        /// Operator for compound assignment
        op: Option<BinaryOp>,
        /// Right-hand side
        value: Box<Expression>,
    },

    /// `++x`, `x++`, `--x`, `x--`
    Update {
        /// Number being changed
        target: Reference,
        /// `++` (true) or `--` (false)
        increment: bool,
        /// Prefix form yields the new value, postfix the old one
        prefix: bool,
    },

    /// `callee(args...)`
    Call {
        /// Expression producing the function
        callee: Box<Expression>,
        /// Argument expressions, evaluated left to right
        args: Vec<Expression>,
    },

    /// Function literal
    Function(Arc<FunctionDef>),

    /// `value is kind`
    Is {
        /// Tested value
        value: Box<Expression>,
        /// Expected kind
        kind: ValueKind,
    },

    /// `import("library")`
    Import(String),
}

/// Assignable expression: supports get, set and delete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    /// What is referenced
    pub kind: ReferenceKind,
    /// Source range of the reference
    pub span: SourceSpan,
}

/// Reference variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReferenceKind {
    /// `$name`
    Variable(String),
    /// Bare identifier addressing a root property
    Root(String),
    /// `target.name`
    Property {
        /// Object or receiver expression
        target: Box<Expression>,
        /// Property name
        name: String,
    },
    /// `target[index]`
    Index {
        /// Array, object or string expression
        target: Box<Expression>,
        /// Index or key expression
        index: Box<Expression>,
    },
}

/// User-defined function body and signature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    /// Declared name (None for literals)
    pub name: Option<String>,
    /// Parameters in declaration order
    pub params: Vec<Parameter>,
    /// Function body
    pub body: FunctionBody,
    /// Source range of the definition
    pub span: SourceSpan,
}

/// A single function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Parameter {
    /// Bound to a variable of this name
    Named(String),
    /// `this`: the argument becomes the function's root
    Root,
}

/// Function body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FunctionBody {
    /// `{ statements }`
    Block(Vec<Statement>),
    /// `-> expr`
    Expression(Expression),
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    /// Number literal
    Number(f64),
    /// String literal
    String(String),
    /// `true` / `false`
    Boolean(bool),
    /// `null`
    Null,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `in`
    In,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
}

/// Short-circuiting operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
}

/// Dynamic kind of a runtime value, as named by `is`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    /// Ordered key/value mapping
    Object,
    /// Ordered sequence
    Array,
    /// Text
    String,
    /// Double-precision number
    Number,
    /// `true` / `false`
    Boolean,
    /// `null`
    Null,
    /// Script or native function
    Function,
}

impl ValueKind {
    /// Looks up a kind by its script-visible name
    pub fn from_name(name: &str) -> Option<ValueKind> {
        let kind = match name {
            "object" => ValueKind::Object,
            "array" => ValueKind::Array,
            "string" => ValueKind::String,
            "number" => ValueKind::Number,
            "boolean" => ValueKind::Boolean,
            "null" => ValueKind::Null,
            "function" => ValueKind::Function,
            _ => return None,
        };
        Some(kind)
    }

    /// Script-visible name
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Object => "object",
            ValueKind::Array => "array",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Null => "null",
            ValueKind::Function => "function",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
