//! Patch script parser
//!
//! Statements are parsed by recursive descent, expressions by precedence
//! climbing. A failed statement is recorded, skipped and replaced with an
//! error placeholder so a single pass reports every independent mistake.

pub mod ast;
mod expression;
mod metadata;
#[allow(clippy::module_inception)]
mod parser;

pub use ast::{
    BinaryOp, Expression, ExpressionKind, FunctionBody, FunctionDef, Literal, LogicalOp,
    Parameter, Program, Reference, ReferenceKind, Statement, StatementKind, UnaryOp, ValueKind,
};
pub use expression::Precedence;
pub use metadata::{Metadata, MetadataParser, MetadataRegistry, DEFAULT_METADATA};
pub use parser::{Parser, MAX_NESTING_DEPTH};

use crate::error::Result;
use crate::lexer::lex;

/// Lexes and parses `source`, attributing spans to `file`
pub fn parse_source(source: &str, file: &str) -> Result<Program> {
    let tokens = lex(source, file)?;
    let result = Parser::new(tokens).parse();
    match &result {
        Ok(program) => tracing::debug!(
            file,
            statements = program.statements.len(),
            "parsed patch script"
        ),
        Err(error) => tracing::debug!(file, %error, "failed to parse patch script"),
    }
    result
}
