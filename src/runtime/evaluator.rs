//! Tree-walking evaluator
//!
//! Statements return a [`Signal`] instead of unwinding: `break`, `continue`
//! and `return` travel up the `execute` chain until a loop or a function
//! call consumes them. Evaluation errors are ordinary `Err` values.

use indexmap::IndexMap;

use super::context::{Closure, Context};
use super::operators;
use super::value::{resolve_index, FunctionValue, Value};
use crate::error::{EvalErrorKind, EvalResult, EvaluationError};
use crate::lexer::SourceSpan;
use crate::library;
use crate::parser::{
    BinaryOp, Expression, ExpressionKind, FunctionBody, FunctionDef, Literal, LogicalOp,
    Parameter, Program, Reference, ReferenceKind, Statement, StatementKind,
};

/// Control-flow outcome of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Continue with the next statement
    Normal,
    /// Leave the innermost loop
    Break,
    /// Skip to the next iteration of the innermost loop
    Continue,
    /// Leave the current function with a value
    Return(Value),
}

impl Program {
    /// Runs every top-level statement against `ctx`.
    ///
    /// A top-level `return` ends the script early without error.
    pub fn execute(&self, ctx: &Context) -> EvalResult<()> {
        for statement in &self.statements {
            match statement.execute(ctx)? {
                Signal::Normal => {}
                Signal::Return(_) => {
                    tracing::debug!(at = %statement.span, "script returned early");
                    return Ok(());
                }
                Signal::Break | Signal::Continue => {
                    return Err(EvaluationError::at(
                        EvalErrorKind::Runtime("break or continue outside of a loop".into()),
                        &statement.span,
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Runs statements in order, stopping at the first non-normal signal
fn execute_all(statements: &[Statement], ctx: &Context) -> EvalResult<Signal> {
    for statement in statements {
        let signal = statement.execute(ctx)?;
        if signal != Signal::Normal {
            return Ok(signal);
        }
    }
    Ok(Signal::Normal)
}

// ============================================================================
// Statements
// ============================================================================

impl Statement {
    /// Executes the statement for its effect
    pub fn execute(&self, ctx: &Context) -> EvalResult<Signal> {
        match &self.kind {
            StatementKind::Block(statements) => execute_all(statements, &ctx.new_scope()),
            StatementKind::Expression(expression) => {
                expression.evaluate(ctx)?;
                Ok(Signal::Normal)
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if condition.evaluate(ctx)?.as_boolean() {
                    then_branch.execute(ctx)
                } else if let Some(else_branch) = else_branch {
                    else_branch.execute(ctx)
                } else {
                    Ok(Signal::Normal)
                }
            }
            StatementKind::While { condition, body } => exec_while(condition, body, ctx),
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => exec_for(init.as_deref(), condition.as_ref(), update.as_ref(), body, ctx),
            StatementKind::Foreach {
                variable,
                iterable,
                body,
            } => exec_foreach(variable, iterable, body, ctx),
            StatementKind::VarDecl {
                name,
                mutable,
                value,
            } => {
                let value = value.evaluate(ctx)?;
                ctx.variables()
                    .declare(name, value, *mutable)
                    .map_err(|e| e.or_at(&self.span))?;
                Ok(Signal::Normal)
            }
            StatementKind::Delete(reference) => {
                Place::resolve(reference, ctx)?
                    .delete(ctx)
                    .map_err(|e| e.or_at(&reference.span))?;
                Ok(Signal::Normal)
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(value) => value.evaluate(ctx)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(value))
            }
            StatementKind::Break => Ok(Signal::Break),
            StatementKind::Continue => Ok(Signal::Continue),
            StatementKind::FunctionDecl(def) => {
                let name = def.name.as_deref().ok_or_else(|| {
                    EvaluationError::at(
                        EvalErrorKind::Runtime("function declaration without a name".into()),
                        &self.span,
                    )
                })?;
                let function = Value::function(FunctionValue::Script {
                    def: def.clone(),
                    closure: ctx.capture(),
                });
                ctx.variables()
                    .declare(name, function, false)
                    .map_err(|e| e.or_at(&self.span))?;
                Ok(Signal::Normal)
            }
            StatementKind::Import { library, binding } => {
                let imported = ctx.import(library, &self.span)?;
                ctx.variables()
                    .declare(binding, imported, false)
                    .map_err(|e| e.or_at(&self.span))?;
                Ok(Signal::Normal)
            }
            StatementKind::Apply { target, action } => {
                let root = match target.evaluate(ctx)? {
                    Value::Object(root) => root,
                    other => {
                        return Err(EvaluationError::type_error(
                            "object for apply",
                            other.type_name(),
                        )
                        .or_at(&target.span))
                    }
                };
                action.execute(&ctx.with_root(root))
            }
            StatementKind::Error(_) => Err(EvaluationError::at(
                EvalErrorKind::UnparsedStatement,
                &self.span,
            )),
            StatementKind::NoOp => Ok(Signal::Normal),
        }
    }
}

/// What a loop does after its body ran
enum LoopStep {
    Next,
    Exit(Signal),
}

fn loop_step(signal: Signal) -> LoopStep {
    match signal {
        Signal::Normal | Signal::Continue => LoopStep::Next,
        Signal::Break => LoopStep::Exit(Signal::Normal),
        Signal::Return(value) => LoopStep::Exit(Signal::Return(value)),
    }
}

fn exec_while(condition: &Expression, body: &Statement, ctx: &Context) -> EvalResult<Signal> {
    while condition.evaluate(ctx)?.as_boolean() {
        if let LoopStep::Exit(signal) = loop_step(body.execute(ctx)?) {
            return Ok(signal);
        }
    }
    Ok(Signal::Normal)
}

fn exec_for(
    init: Option<&Statement>,
    condition: Option<&Expression>,
    update: Option<&Expression>,
    body: &Statement,
    ctx: &Context,
) -> EvalResult<Signal> {
    let scope = ctx.new_scope();
    if let Some(init) = init {
        init.execute(&scope)?;
    }
    loop {
        if let Some(condition) = condition {
            if !condition.evaluate(&scope)?.as_boolean() {
                break;
            }
        }
        if let LoopStep::Exit(signal) = loop_step(body.execute(&scope)?) {
            return Ok(signal);
        }
        if let Some(update) = update {
            update.evaluate(&scope)?;
        }
    }
    Ok(Signal::Normal)
}

fn exec_foreach(
    variable: &str,
    iterable: &Expression,
    body: &Statement,
    ctx: &Context,
) -> EvalResult<Signal> {
    let items: Vec<Value> = match iterable.evaluate(ctx)? {
        Value::Array(items) => items.borrow().clone(),
        Value::Object(entries) => entries.borrow().keys().map(Value::string).collect(),
        other => {
            return Err(
                EvaluationError::type_error("array or object to iterate", other.type_name())
                    .or_at(&iterable.span),
            )
        }
    };
    for item in items {
        let scope = ctx.new_scope();
        scope
            .variables()
            .declare(variable, item, false)
            .map_err(|e| e.or_at(&iterable.span))?;
        if let LoopStep::Exit(signal) = loop_step(body.execute(&scope)?) {
            return Ok(signal);
        }
    }
    Ok(Signal::Normal)
}

// ============================================================================
// Expressions
// ============================================================================

impl Expression {
    /// Evaluates the expression to a single value
    pub fn evaluate(&self, ctx: &Context) -> EvalResult<Value> {
        match &self.kind {
            ExpressionKind::Literal(literal) => Ok(literal_value(literal)),
            ExpressionKind::Reference(reference) => Place::resolve(reference, ctx)?
                .get(ctx)
                .map_err(|e| e.or_at(&reference.span)),
            ExpressionKind::Root => Ok(Value::Object(ctx.root().clone())),
            ExpressionKind::ArrayInit(items) => Ok(Value::array(evaluate_all(items, ctx)?)),
            ExpressionKind::ObjectInit(entries) => {
                let mut object = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    object.insert(key.clone(), value.evaluate(ctx)?);
                }
                Ok(Value::object(object))
            }
            ExpressionKind::Unary { op, operand } => {
                let operand = operand.evaluate(ctx)?;
                operators::unary(*op, &operand).map_err(|e| e.or_at(&self.span))
            }
            ExpressionKind::Binary { op, left, right } => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                operators::binary(*op, &left, &right).map_err(|e| e.or_at(&self.span))
            }
            ExpressionKind::Logical { op, left, right } => {
                let left = left.evaluate(ctx)?.as_boolean();
                let result = match op {
                    LogicalOp::And => left && right.evaluate(ctx)?.as_boolean(),
                    LogicalOp::Or => left || right.evaluate(ctx)?.as_boolean(),
                };
                Ok(Value::Boolean(result))
            }
            ExpressionKind::Assign { target, op, value } => {
                eval_assign(target, *op, value, ctx, &self.span)
            }
            ExpressionKind::Update {
                target,
                increment,
                prefix,
            } => eval_update(target, *increment, *prefix, ctx),
            ExpressionKind::Call { callee, args } => {
                let function = callee.evaluate(ctx)?;
                let args = evaluate_all(args, ctx)?;
                call_value(&function, args, ctx, &self.span)
            }
            ExpressionKind::Function(def) => Ok(Value::function(FunctionValue::Script {
                def: def.clone(),
                closure: ctx.capture(),
            })),
            ExpressionKind::Is { value, kind } => {
                Ok(Value::Boolean(value.evaluate(ctx)?.kind() == *kind))
            }
            ExpressionKind::Import(name) => ctx.import(name, &self.span),
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::string(s),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Null => Value::Null,
    }
}

fn evaluate_all(expressions: &[Expression], ctx: &Context) -> EvalResult<Vec<Value>> {
    expressions.iter().map(|e| e.evaluate(ctx)).collect()
}

fn eval_assign(
    target: &Reference,
    op: Option<BinaryOp>,
    value: &Expression,
    ctx: &Context,
    span: &SourceSpan,
) -> EvalResult<Value> {
    let place = Place::resolve(target, ctx)?;
    let value = match op {
        None => value.evaluate(ctx)?,
        Some(op) => {
            let current = place.get(ctx).map_err(|e| e.or_at(&target.span))?;
            let operand = value.evaluate(ctx)?;
            operators::binary(op, &current, &operand).map_err(|e| e.or_at(span))?
        }
    };
    place
        .set(ctx, value.clone())
        .map_err(|e| e.or_at(&target.span))?;
    Ok(value)
}

fn eval_update(
    target: &Reference,
    increment: bool,
    prefix: bool,
    ctx: &Context,
) -> EvalResult<Value> {
    let place = Place::resolve(target, ctx)?;
    let old = place
        .get(ctx)
        .and_then(|value| value.as_number())
        .map_err(|e| e.or_at(&target.span))?;
    let new = if increment { old + 1.0 } else { old - 1.0 };
    place
        .set(ctx, Value::Number(new))
        .map_err(|e| e.or_at(&target.span))?;
    Ok(Value::Number(if prefix { new } else { old }))
}

// ============================================================================
// References
// ============================================================================

/// A reference whose sub-expressions have been evaluated
enum Place<'a> {
    /// `$name`
    Variable(&'a str),
    /// Bare identifier
    Root(&'a str),
    /// `container.name`
    Property(Value, &'a str),
    /// `container[index]`
    Index(Value, Value),
}

impl<'a> Place<'a> {
    fn resolve(reference: &'a Reference, ctx: &Context) -> EvalResult<Place<'a>> {
        Ok(match &reference.kind {
            ReferenceKind::Variable(name) => Place::Variable(name),
            ReferenceKind::Root(name) => Place::Root(name),
            ReferenceKind::Property { target, name } => Place::Property(target.evaluate(ctx)?, name),
            ReferenceKind::Index { target, index } => {
                let container = target.evaluate(ctx)?;
                let index = index.evaluate(ctx)?;
                Place::Index(container, index)
            }
        })
    }

    fn get(&self, ctx: &Context) -> EvalResult<Value> {
        match self {
            Place::Variable(name) => ctx.variables().get(name).ok_or_else(|| {
                EvaluationError::new(EvalErrorKind::UndefinedVariable {
                    name: name.to_string(),
                })
            }),
            Place::Root(name) => {
                if let Some(value) = ctx.root().borrow().get(*name) {
                    return Ok(value.clone());
                }
                ctx.variables().get(name).ok_or_else(|| {
                    EvaluationError::new(EvalErrorKind::UndefinedName {
                        name: name.to_string(),
                    })
                })
            }
            Place::Property(container, name) => get_property(container, name),
            Place::Index(container, index) => get_index(container, index),
        }
    }

    fn set(&self, ctx: &Context, value: Value) -> EvalResult<()> {
        match self {
            Place::Variable(name) => ctx.variables().assign(name, value),
            Place::Root(name) => {
                ctx.root().borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Place::Property(container, name) => {
                container
                    .as_object()?
                    .borrow_mut()
                    .insert(name.to_string(), value);
                Ok(())
            }
            Place::Index(container, index) => match container {
                Value::Object(entries) => {
                    let key = index.as_str()?.to_string();
                    entries.borrow_mut().insert(key, value);
                    Ok(())
                }
                Value::Array(items) => {
                    let mut items = items.borrow_mut();
                    let position = element_index(index, items.len())?;
                    items[position] = value;
                    Ok(())
                }
                other => Err(EvaluationError::type_error(
                    "object or array to assign into",
                    other.type_name(),
                )),
            },
        }
    }

    fn delete(&self, ctx: &Context) -> EvalResult<()> {
        match self {
            Place::Variable(name) => ctx.variables().remove(name).map(|_| ()),
            Place::Root(name) => remove_key(ctx.root(), name),
            Place::Property(container, name) => remove_key(container.as_object()?, name),
            Place::Index(container, index) => match container {
                Value::Object(entries) => remove_key(entries, index.as_str()?),
                Value::Array(items) => {
                    let mut items = items.borrow_mut();
                    let position = element_index(index, items.len())?;
                    items.remove(position);
                    Ok(())
                }
                other => Err(EvaluationError::type_error(
                    "object or array to delete from",
                    other.type_name(),
                )),
            },
        }
    }
}

fn missing_key(key: &str) -> EvaluationError {
    EvaluationError::new(EvalErrorKind::MissingKey {
        key: key.to_string(),
    })
}

fn remove_key(object: &super::value::ObjectRef, key: &str) -> EvalResult<()> {
    object
        .borrow_mut()
        .shift_remove(key)
        .map(|_| ())
        .ok_or_else(|| missing_key(key))
}

/// Position addressed by an integral index; negative indices count from the end
fn element_index(index: &Value, length: usize) -> EvalResult<usize> {
    resolve_index(index.as_integer()?, length, false)
}

fn get_property(container: &Value, name: &str) -> EvalResult<Value> {
    match container {
        Value::Object(entries) => entries
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| missing_key(name)),
        Value::String(_) | Value::Array(_) => match library::method(container, name) {
            Some(function) => Ok(Value::function(FunctionValue::Bound {
                receiver: container.clone(),
                function,
            })),
            None => Err(EvaluationError::runtime(format!(
                "{} has no method '{}'",
                container.type_name(),
                name
            ))),
        },
        other => Err(EvaluationError::type_error(
            format!("object for property '{}'", name),
            other.type_name(),
        )),
    }
}

fn get_index(container: &Value, index: &Value) -> EvalResult<Value> {
    match container {
        Value::Object(entries) => {
            let key = index.as_str()?;
            entries
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| missing_key(key))
        }
        Value::Array(items) => {
            let items = items.borrow();
            let position = element_index(index, items.len())?;
            Ok(items[position].clone())
        }
        Value::String(text) => {
            let length = text.chars().count();
            let position = element_index(index, length)?;
            let c = text.chars().nth(position).map(String::from).unwrap_or_default();
            Ok(Value::from(c))
        }
        other => Err(EvaluationError::type_error(
            "object, array or string to index",
            other.type_name(),
        )),
    }
}

// ============================================================================
// Calls
// ============================================================================

/// Calls any function value with already evaluated arguments
pub fn call_value(
    function: &Value,
    args: Vec<Value>,
    ctx: &Context,
    span: &SourceSpan,
) -> EvalResult<Value> {
    let function = match function {
        Value::Function(function) => function,
        other => {
            return Err(EvaluationError::at(
                EvalErrorKind::NotCallable {
                    type_name: other.type_name().to_string(),
                },
                span,
            ))
        }
    };
    let _guard = ctx.enter_call().map_err(|e| e.or_at(span))?;

    match &**function {
        FunctionValue::Native(native) => library::dispatch(*native, args, ctx, span),
        FunctionValue::Bound {
            receiver,
            function: native,
        } => {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(receiver.clone());
            full.extend(args);
            library::dispatch(*native, full, ctx, span)
        }
        FunctionValue::Script { def, closure } => {
            if args.len() != def.params.len() {
                return Err(EvaluationError::at(
                    EvalErrorKind::ArityMismatch {
                        function: function.describe(),
                        expected: def.params.len().to_string(),
                        got: args.len(),
                    },
                    span,
                ));
            }
            call_script(def, closure, args, span).map_err(|e| {
                e.wrap(
                    EvalErrorKind::InCall {
                        function: function.describe(),
                    },
                    span,
                )
            })
        }
    }
}

/// Runs a script function body in a new scope chained to its closure
fn call_script(
    def: &FunctionDef,
    closure: &Closure,
    args: Vec<Value>,
    span: &SourceSpan,
) -> EvalResult<Value> {
    let mut scope = closure.context().map_err(|e| e.or_at(span))?.new_scope();
    for (param, arg) in def.params.iter().zip(args) {
        match param {
            Parameter::Named(name) => scope.variables().bind_parameter(name, arg),
            Parameter::Root => match arg {
                Value::Object(root) => scope = scope.with_root(root),
                other => {
                    return Err(EvaluationError::type_error(
                        "object for 'this' parameter",
                        other.type_name(),
                    )
                    .or_at(span))
                }
            },
        }
    }
    match &def.body {
        FunctionBody::Block(statements) => match execute_all(statements, &scope)? {
            Signal::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        },
        FunctionBody::Expression(expression) => expression.evaluate(&scope),
    }
}
