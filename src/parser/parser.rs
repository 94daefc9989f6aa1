//! Recursive-descent statement parser with statement-level error recovery

use super::ast::{Expression, FunctionBody, FunctionDef, Parameter, Program, Statement, StatementKind};
use super::metadata::{Metadata, MetadataRegistry, DEFAULT_METADATA};
use crate::error::{Error, ParseError, ParseResult, Result};
use crate::lexer::{SourceSpan, Token, TokenKind};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Arc;

/// Deepest allowed nesting of statements, expressions and constants, counted
/// together
pub const MAX_NESTING_DEPTH: usize = 200;

/// Parser over the tokens of one file
pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
    /// Set once the parse hit end of input mid-statement
    aborted: bool,
    /// Enclosing loops in the current function body
    pub(super) loop_depth: usize,
    /// Current statement, expression and constant recursion depth
    depth: usize,
    metadata: &'a MetadataRegistry,
}

impl Parser<'static> {
    /// Creates a parser using the default metadata keys
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser::with_metadata(tokens, &DEFAULT_METADATA)
    }
}

impl<'a> Parser<'a> {
    /// Creates a parser with a custom metadata registry
    pub fn with_metadata(mut tokens: Vec<Token>, metadata: &'a MetadataRegistry) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let end = tokens
                .last()
                .map(|t| t.span.clone())
                .unwrap_or_else(|| SourceSpan::new(empty_pos(), empty_pos()));
            tokens.push(Token::new(TokenKind::Eof, end));
        }
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            aborted: false,
            loop_depth: 0,
            depth: 0,
            metadata,
        }
    }

    /// Parses the whole token stream.
    ///
    /// Returns a program only when no error was found; otherwise every error,
    /// in source order.
    pub fn parse(mut self) -> Result<Program> {
        let metadata = self.parse_metadata_tags();

        let mut statements = Vec::new();
        while !self.aborted && !self.is_at_end() {
            match self.recovering_statement() {
                Some(statement) => statements.push(statement),
                None => break,
            }
        }

        if self.errors.is_empty() {
            Ok(Program {
                metadata,
                statements,
            })
        } else {
            Err(Error::Parse(self.errors))
        }
    }

    fn parse_metadata_tags(&mut self) -> Metadata {
        let mut metadata = Metadata::default();
        while !self.aborted && self.check(&TokenKind::At) {
            let start = self.current;
            self.advance();
            if let Err(error) = self.parse_metadata_tag(&mut metadata) {
                self.recover(error, start);
            }
        }
        metadata
    }

    fn parse_metadata_tag(&mut self, metadata: &mut Metadata) -> ParseResult<()> {
        let key_token = self.advance();
        let key = match &key_token.kind {
            TokenKind::Word(word) => word.clone(),
            other => {
                return Err(ParseError::new(
                    format!("Expected a metadata key after '@', found {}", other),
                    key_token.span,
                ))
            }
        };
        let parser = self.metadata.get(&key).ok_or_else(|| {
            ParseError::new(format!("Unknown metadata key '{}'", key), key_token.span.clone())
        })?;
        if metadata.contains(&key) {
            return Err(ParseError::new(
                format!("Duplicate metadata key '{}'", key),
                key_token.span,
            ));
        }
        let value = parser(self)?;
        self.expect(TokenKind::Semicolon, "';' after metadata value")?;
        metadata.insert(key, value);
        Ok(())
    }

    /// Parses one statement; on failure records the error, skips ahead and
    /// returns a placeholder. Returns None once end of input was hit.
    fn recovering_statement(&mut self) -> Option<Statement> {
        let start = self.current;
        let start_span = self.peek().span.clone();
        match self.parse_statement() {
            Ok(statement) => Some(statement),
            Err(error) => {
                let message = error.message.clone();
                self.recover(error, start);
                if self.aborted {
                    return None;
                }
                let span = start_span.to(&self.previous().span);
                Some(Statement {
                    kind: StatementKind::Error(message),
                    span,
                })
            }
        }
    }

    fn recover(&mut self, error: ParseError, start: usize) {
        if self.aborted {
            return;
        }
        self.errors.push(error);
        if self.is_at_end() {
            self.aborted = true;
            return;
        }
        self.synchronize(start);
    }

    /// Skips to just past the next `;` or to the end of the block the failed
    /// statement opened, stopping before a `}` that closes an enclosing block
    fn synchronize(&mut self, start: usize) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
        if self.current == start && !self.is_at_end() {
            self.advance();
        }
    }

    pub(super) fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> ParseResult<Statement> {
        let start = self.peek().span.clone();
        let kind = match &self.peek().kind {
            TokenKind::LeftBrace => StatementKind::Block(self.parse_block()?),
            TokenKind::Semicolon => {
                self.advance();
                StatementKind::NoOp
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Foreach => self.parse_foreach()?,
            TokenKind::Var | TokenKind::Val => self.parse_var_decl()?,
            TokenKind::Delete => self.parse_delete()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Break | TokenKind::Continue => self.parse_loop_jump()?,
            TokenKind::Function if self.next_is_name() => self.parse_function_decl()?,
            TokenKind::Import if matches!(self.peek_next().kind, TokenKind::String(_)) => {
                self.parse_import()?
            }
            TokenKind::Apply => self.parse_apply()?,
            TokenKind::At => {
                return Err(ParseError::new(
                    "Metadata tags must come before the first statement",
                    start,
                ))
            }
            TokenKind::RightBrace => {
                return Err(ParseError::new("Unexpected '}'", start));
            }
            _ => {
                let expression = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "';' after expression")?;
                StatementKind::Expression(expression)
            }
        };
        Ok(Statement {
            kind,
            span: start.to(&self.previous().span),
        })
    }

    /// `{ statement* }`
    pub(super) fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(TokenKind::LeftBrace, "'{'")?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(self.error_here("Expected '}' to close block"));
            }
            match self.recovering_statement() {
                Some(statement) => statements.push(statement),
                None => return Err(self.error_here("Unexpected end of file")),
            }
        }
        self.advance();
        Ok(statements)
    }

    fn parse_if(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let condition = self.parse_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(StatementKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let condition = self.parse_condition()?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(StatementKind::While { condition, body })
    }

    fn parse_for(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        self.expect(TokenKind::LeftParen, "'(' after 'for'")?;

        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else {
            let start = self.peek().span.clone();
            let kind = if matches!(self.peek().kind, TokenKind::Var | TokenKind::Val) {
                self.parse_var_decl()?
            } else {
                let expression = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "';' after loop initializer")?;
                StatementKind::Expression(expression)
            };
            Some(Box::new(Statement {
                kind,
                span: start.to(&self.previous().span),
            }))
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon, "';' after loop condition")?;

        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RightParen, "')' after for clauses")?;

        let body = Box::new(self.parse_loop_body()?);
        Ok(StatementKind::For {
            init,
            condition,
            update,
            body,
        })
    }

    fn parse_foreach(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        self.expect(TokenKind::LeftParen, "'(' after 'foreach'")?;
        let variable = self.parse_name("loop variable name")?;
        self.expect(TokenKind::In, "'in' after loop variable")?;
        let iterable = self.parse_expression()?;
        self.expect(TokenKind::RightParen, "')' after foreach clause")?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(StatementKind::Foreach {
            variable,
            iterable,
            body,
        })
    }

    fn parse_loop_body(&mut self) -> ParseResult<Statement> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    fn parse_var_decl(&mut self) -> ParseResult<StatementKind> {
        let mutable = self.advance().kind == TokenKind::Var;
        let name = self.parse_name("variable name")?;
        self.expect(TokenKind::Assign, "'=' in variable declaration")?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(StatementKind::VarDecl {
            name,
            mutable,
            value,
        })
    }

    fn parse_delete(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let target = self.parse_expression()?;
        let reference = target.into_reference().map_err(|expression| {
            ParseError::new(
                "Only variables, properties and indices can be deleted",
                expression.span,
            )
        })?;
        self.expect(TokenKind::Semicolon, "';' after delete")?;
        Ok(StatementKind::Delete(reference))
    }

    fn parse_return(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon, "';' after return")?;
        Ok(StatementKind::Return(value))
    }

    fn parse_loop_jump(&mut self) -> ParseResult<StatementKind> {
        let token = self.advance();
        if self.loop_depth == 0 {
            return Err(ParseError::new(
                format!("{} outside of a loop", token.kind),
                token.span,
            ));
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(if token.kind == TokenKind::Break {
            StatementKind::Break
        } else {
            StatementKind::Continue
        })
    }

    fn parse_function_decl(&mut self) -> ParseResult<StatementKind> {
        let start = self.advance().span;
        let name = self.parse_name("function name")?;
        let params = self.parse_parameters()?;
        let body = FunctionBody::Block(self.parse_function_block()?);
        Ok(StatementKind::FunctionDecl(Arc::new(FunctionDef {
            name: Some(name),
            params,
            body,
            span: start.to(&self.previous().span),
        })))
    }

    /// `( param, ... )` where a param is a name or `this`
    pub(super) fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.expect(TokenKind::LeftParen, "'(' before parameters")?;
        let mut params: Vec<Parameter> = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let span = self.peek().span.clone();
                let param = if self.match_token(&TokenKind::This) {
                    Parameter::Root
                } else {
                    Parameter::Named(self.parse_name("parameter name")?)
                };
                if params.contains(&param) {
                    let shown = match &param {
                        Parameter::Named(name) => name.as_str(),
                        Parameter::Root => "this",
                    };
                    return Err(ParseError::new(
                        format!("Duplicate parameter '{}'", shown),
                        span,
                    ));
                }
                params.push(param);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "')' after parameters")?;
        Ok(params)
    }

    /// Function bodies start outside of any loop
    pub(super) fn parse_function_block(&mut self) -> ParseResult<Vec<Statement>> {
        let outer_loops = std::mem::take(&mut self.loop_depth);
        let body = self.parse_block();
        self.loop_depth = outer_loops;
        body
    }

    fn parse_import(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let token = self.advance();
        let library = match token.kind {
            TokenKind::String(name) => name,
            other => {
                return Err(ParseError::new(
                    format!("Expected a library name string, found {}", other),
                    token.span,
                ))
            }
        };
        let binding = if self.match_token(&TokenKind::As) {
            self.parse_name("import alias")?
        } else if is_identifier(&library) {
            library.clone()
        } else {
            return Err(ParseError::new(
                format!(
                    "Library name \"{}\" is not a valid identifier; name it with 'as'",
                    library
                ),
                token.span,
            ));
        };
        self.expect(TokenKind::Semicolon, "';' after import")?;
        Ok(StatementKind::Import { library, binding })
    }

    fn parse_apply(&mut self) -> ParseResult<StatementKind> {
        self.advance();
        let target = self.parse_condition()?;
        let action = Box::new(self.parse_statement()?);
        Ok(StatementKind::Apply { target, action })
    }

    /// `( expr )`
    fn parse_condition(&mut self) -> ParseResult<Expression> {
        self.expect(TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen, "')'")?;
        Ok(condition)
    }

    /// A declared name: `name`, `'name'` or `$name`
    pub(super) fn parse_name(&mut self, what: &str) -> ParseResult<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Word(name) | TokenKind::Variable(name) => Ok(name),
            other => Err(ParseError::new(
                format!("Expected {}, found {}", what, other),
                token.span,
            )),
        }
    }

    /// Parses a constant literal (number, string, boolean, null, or an array
    /// or object of constants) directly into JSON
    pub fn parse_constant(&mut self) -> ParseResult<JsonValue> {
        self.nested(Self::constant)
    }

    fn constant(&mut self) -> ParseResult<JsonValue> {
        let token = self.advance();
        let value = match token.kind {
            TokenKind::Number(n) => number_to_json(n),
            TokenKind::Minus => match self.advance().kind {
                TokenKind::Number(n) => number_to_json(-n),
                other => {
                    return Err(ParseError::new(
                        format!("Expected a number after '-', found {}", other),
                        self.previous().span.clone(),
                    ))
                }
            },
            TokenKind::String(s) | TokenKind::Word(s) => JsonValue::String(s),
            TokenKind::True => JsonValue::Bool(true),
            TokenKind::False => JsonValue::Bool(false),
            TokenKind::Null => JsonValue::Null,
            TokenKind::LeftBracket => {
                let mut items = Vec::new();
                while !self.match_token(&TokenKind::RightBracket) {
                    items.push(self.parse_constant()?);
                    if !self.match_token(&TokenKind::Comma) {
                        self.expect(TokenKind::RightBracket, "',' or ']'")?;
                        break;
                    }
                }
                JsonValue::Array(items)
            }
            TokenKind::LeftBrace => {
                let mut map = JsonMap::new();
                while !self.match_token(&TokenKind::RightBrace) {
                    let key_token = self.advance();
                    let key = match key_token.kind {
                        TokenKind::String(s) | TokenKind::Word(s) => s,
                        other => {
                            return Err(ParseError::new(
                                format!("Expected an object key, found {}", other),
                                key_token.span,
                            ))
                        }
                    };
                    self.expect(TokenKind::Colon, "':' after object key")?;
                    let value = self.parse_constant()?;
                    if map.insert(key.clone(), value).is_some() {
                        return Err(ParseError::new(
                            format!("Duplicate object key '{}'", key),
                            key_token.span,
                        ));
                    }
                    if !self.match_token(&TokenKind::Comma) {
                        self.expect(TokenKind::RightBrace, "',' or '}'")?;
                        break;
                    }
                }
                JsonValue::Object(map)
            }
            other => {
                return Err(ParseError::new(
                    format!("Expected a constant value, found {}", other),
                    token.span,
                ))
            }
        };
        Ok(value)
    }

    // Helper methods

    /// Runs `parse` one nesting level deeper, failing at [`MAX_NESTING_DEPTH`]
    pub(super) fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here(format!(
                "Code nested too deeply (limit {})",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// True at the end-of-file token
    pub fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Current token
    pub fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(super) fn peek_next(&self) -> &Token {
        let index = (self.current + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub(super) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Consumes and returns the current token (never moves past end of file)
    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.current].clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    /// Whether the current token has the same kind as `kind` (payload ignored)
    pub fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(super) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a token of the given kind or fails naming what was expected
    pub fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("Expected {}, found {}", expected, self.peek().kind)))
        }
    }

    pub(super) fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.peek().span.clone())
    }

    fn next_is_name(&self) -> bool {
        matches!(
            self.peek_next().kind,
            TokenKind::Word(_) | TokenKind::Variable(_)
        )
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && TokenKind::keyword(name).is_none()
}

fn number_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn empty_pos() -> crate::lexer::SourcePos {
    crate::lexer::SourcePos::new(Arc::from(""), 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::ast::ExpressionKind;

    fn parse(source: &str) -> Result<Program> {
        Parser::new(lex(source, "test").unwrap()).parse()
    }

    fn errors(source: &str) -> Vec<ParseError> {
        match parse(source) {
            Err(Error::Parse(errors)) => errors,
            other => panic!("expected parse errors, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_var_decl() {
        let program = parse("var $x = 42; val y = 1;").unwrap();
        assert_eq!(program.statements.len(), 2);
        match &program.statements[0].kind {
            StatementKind::VarDecl { name, mutable, .. } => {
                assert_eq!(name, "x");
                assert!(*mutable);
            }
            other => panic!("Expected VarDecl, got {:?}", other),
        }
        match &program.statements[1].kind {
            StatementKind::VarDecl { name, mutable, .. } => {
                assert_eq!(name, "y");
                assert!(!*mutable);
            }
            other => panic!("Expected VarDecl, got {:?}", other),
        }
    }

    #[test]
    fn test_statement_span_covers_semicolon() {
        let program = parse("x = 1;").unwrap();
        let span = &program.statements[0].span;
        assert_eq!(span.from.column, 1);
        assert_eq!(span.to.column, 7);
    }

    #[test]
    fn test_metadata_tags() {
        let program = parse("@version 1;\n@target [\"a.json\", 'b'];\nx = 1;").unwrap();
        assert_eq!(program.metadata.version(), Some(1.0));
        assert_eq!(
            program.metadata.target(),
            Some(&serde_json::json!(["a.json", "b"]))
        );
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_metadata_errors() {
        assert!(errors("@version 2;")[0].message.contains("Unsupported version"));
        assert!(errors("@colour 1;")[0].message.contains("Unknown metadata key"));
        assert!(errors("@version 1; @version 1;")[0].message.contains("Duplicate"));
        assert!(errors("x = 1; @version 1;")[0]
            .message
            .contains("before the first statement"));
    }

    #[test]
    fn test_custom_metadata_registry() {
        fn parse_flag(parser: &mut Parser<'_>) -> ParseResult<JsonValue> {
            parser.parse_constant()
        }
        let mut registry = MetadataRegistry::empty();
        registry.register("priority", parse_flag);
        let tokens = lex("@priority -5;", "test").unwrap();
        let program = Parser::with_metadata(tokens, &registry).parse().unwrap();
        assert_eq!(program.metadata.get("priority"), Some(&serde_json::json!(-5)));
    }

    #[test]
    fn test_two_errors_are_both_reported() {
        let errors = errors("var = 1;\nx = 2;\n1 = 3;\ny = 4;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].span.as_ref().unwrap().from.line, 1);
        assert_eq!(errors[1].span.as_ref().unwrap().from.line, 3);
    }

    #[test]
    fn test_recovery_inside_block() {
        let errors = errors("if (a) {\n  b = ;\n  c = 1;\n}\nd = );");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].span.as_ref().unwrap().from.line, 2);
        assert_eq!(errors[1].span.as_ref().unwrap().from.line, 5);
    }

    #[test]
    fn test_unexpected_eof_aborts() {
        let errors = errors("x = 1;\nif (a) { b = 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'}'"));
    }

    #[test]
    fn test_break_outside_loop_is_rejected() {
        assert!(errors("break;")[0].message.contains("outside of a loop"));
        assert!(parse("while (true) { if (x) break; else continue; }").is_ok());
        // A function body is not inside the loop that surrounds its definition
        assert_eq!(
            errors("while (true) { function f() { break; } }").len(),
            1
        );
    }

    #[test]
    fn test_duplicate_parameters() {
        let errors = errors("function f(a, $a) { return a; }");
        assert!(errors[0].message.contains("Duplicate parameter 'a'"));
    }

    #[test]
    fn test_import_statement() {
        let program = parse("import \"math\"; import \"lib/util\" as util;").unwrap();
        match &program.statements[1].kind {
            StatementKind::Import { library, binding } => {
                assert_eq!(library, "lib/util");
                assert_eq!(binding, "util");
            }
            other => panic!("Expected Import, got {:?}", other),
        }
        assert!(errors("import \"lib/util\";")[0].message.contains("'as'"));
    }

    #[test]
    fn test_for_and_foreach() {
        let program =
            parse("for (var i = 0; i < 3; i++) { x += i; } foreach ($v in list) y = v;").unwrap();
        assert!(matches!(
            program.statements[0].kind,
            StatementKind::For { init: Some(_), condition: Some(_), update: Some(_), .. }
        ));
        assert!(matches!(
            program.statements[1].kind,
            StatementKind::Foreach { ref variable, .. } if variable == "v"
        ));
        assert!(parse("for (;;) { break; }").is_ok());
    }

    #[test]
    fn test_delete_requires_reference() {
        assert!(parse("delete a.b; delete $x; delete a[0];").is_ok());
        assert!(errors("delete f();")[0].message.contains("deleted"));
    }

    #[test]
    fn test_function_literal_statement() {
        let program = parse("function(x) -> x;").unwrap();
        match &program.statements[0].kind {
            StatementKind::Expression(expr) => {
                assert!(matches!(expr.kind, ExpressionKind::Function(_)))
            }
            other => panic!("Expected function literal, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_closing_brace() {
        let errors = errors("x = 1; } y = 2;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unexpected '}'"));
    }

    fn on_large_stack<T: Send + 'static>(run: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(run)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_deep_blocks_are_rejected() {
        let errors = on_large_stack(|| {
            let source = format!("{}{}", "{".repeat(200_000), "}".repeat(200_000));
            errors(&source)
        });
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("nested too deeply"));
    }

    #[test]
    fn test_nesting_limit_counts_every_level() {
        let (blocks, conditions, constants, mixed) = on_large_stack(|| {
            let within = format!(
                "{}x = 1;{}",
                "{".repeat(MAX_NESTING_DEPTH - 10),
                "}".repeat(MAX_NESTING_DEPTH - 10)
            );
            let conditions = format!("{}x = 1;", "if (1) ".repeat(1_000));
            let constants = format!("@target {};", "[".repeat(1_000));
            let mixed = format!(
                "{}x = 1;{}",
                "y = function () {".repeat(150),
                "};".repeat(150)
            );
            (
                parse(&within).is_ok(),
                errors(&conditions),
                errors(&constants),
                errors(&mixed),
            )
        });
        assert!(blocks);
        assert!(conditions[0].message.contains("nested too deeply"));
        assert!(constants[0].message.contains("nested too deeply"));
        assert!(mixed[0].message.contains("nested too deeply"));
    }
}
