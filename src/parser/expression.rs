//! Pratt expression parser
//!
//! `expression(min)` parses one prefix term and then keeps folding infix and
//! postfix operators into it while their precedence is strictly greater than
//! `min`. Left-associative operators parse their right operand at their own
//! precedence; assignment and `**` are right-associative.

use super::ast::{
    BinaryOp, Expression, ExpressionKind, FunctionBody, FunctionDef, Literal, LogicalOp,
    Reference, ReferenceKind, UnaryOp, ValueKind,
};
use super::parser::Parser;
use crate::error::{ParseError, ParseResult};
use crate::lexer::TokenKind;
use std::sync::Arc;

/// Binding power, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Start of a full expression
    Lowest,
    /// `=` and compound assignment
    Assignment,
    /// `||`
    LogicalOr,
    /// `&&`
    LogicalAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `==`, `!=`
    Equality,
    /// `<`, `<=`, `>`, `>=`, `is`, `in`
    Comparison,
    /// `<<`, `>>`
    Shift,
    /// `+`, `-`
    Sum,
    /// `*`, `/`, `%`
    Product,
    /// `**`
    Exponent,
    /// Unary `- + ! ~ ++ --`
    Prefix,
    /// Call, index, property, `++`/`--`
    Postfix,
}

impl Precedence {
    /// Precedence of `kind` used as an infix or postfix operator
    pub fn of(kind: &TokenKind) -> Option<Precedence> {
        let precedence = match kind {
            TokenKind::Assign
            | TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign
            | TokenKind::PercentAssign
            | TokenKind::AndAssign
            | TokenKind::OrAssign
            | TokenKind::XorAssign
            | TokenKind::ShiftLeftAssign
            | TokenKind::ShiftRightAssign => Precedence::Assignment,
            TokenKind::DoubleOr => Precedence::LogicalOr,
            TokenKind::DoubleAnd => Precedence::LogicalAnd,
            TokenKind::Pipe => Precedence::BitOr,
            TokenKind::Caret => Precedence::BitXor,
            TokenKind::Ampersand => Precedence::BitAnd,
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equality,
            TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::Is
            | TokenKind::In => Precedence::Comparison,
            TokenKind::ShiftLeft | TokenKind::ShiftRight => Precedence::Shift,
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
            TokenKind::StarStar => Precedence::Exponent,
            TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::Dot
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus => Precedence::Postfix,
            _ => return None,
        };
        Some(precedence)
    }
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus | TokenKind::PlusAssign => BinaryOp::Add,
        TokenKind::Minus | TokenKind::MinusAssign => BinaryOp::Sub,
        TokenKind::Star | TokenKind::StarAssign => BinaryOp::Mul,
        TokenKind::Slash | TokenKind::SlashAssign => BinaryOp::Div,
        TokenKind::Percent | TokenKind::PercentAssign => BinaryOp::Mod,
        TokenKind::StarStar => BinaryOp::Pow,
        TokenKind::Eq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::In => BinaryOp::In,
        TokenKind::Ampersand | TokenKind::AndAssign => BinaryOp::BitAnd,
        TokenKind::Pipe | TokenKind::OrAssign => BinaryOp::BitOr,
        TokenKind::Caret | TokenKind::XorAssign => BinaryOp::BitXor,
        TokenKind::ShiftLeft | TokenKind::ShiftLeftAssign => BinaryOp::Shl,
        TokenKind::ShiftRight | TokenKind::ShiftRightAssign => BinaryOp::Shr,
        _ => return None,
    };
    Some(op)
}

impl<'a> Parser<'a> {
    /// Parses a complete expression
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.expression(Precedence::Lowest)
    }

    fn expression(&mut self, min: Precedence) -> ParseResult<Expression> {
        self.nested(|parser| parser.climb(min))
    }

    fn climb(&mut self, min: Precedence) -> ParseResult<Expression> {
        let mut left = self.prefix()?;
        while let Some(precedence) = Precedence::of(&self.peek().kind) {
            if precedence <= min {
                break;
            }
            left = self.infix(left, precedence)?;
        }
        Ok(left)
    }

    fn prefix(&mut self) -> ParseResult<Expression> {
        let start = self.peek().span.clone();
        let kind = match self.peek().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                ExpressionKind::Literal(Literal::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                ExpressionKind::Literal(Literal::String(s))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.advance().kind == TokenKind::True;
                ExpressionKind::Literal(Literal::Boolean(value))
            }
            TokenKind::Null => {
                self.advance();
                ExpressionKind::Literal(Literal::Null)
            }
            TokenKind::Variable(name) => {
                self.advance();
                ExpressionKind::Reference(Reference {
                    kind: ReferenceKind::Variable(name),
                    span: start.clone(),
                })
            }
            TokenKind::Word(name) => {
                self.advance();
                ExpressionKind::Reference(Reference {
                    kind: ReferenceKind::Root(name),
                    span: start.clone(),
                })
            }
            TokenKind::This => {
                self.advance();
                ExpressionKind::Root
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')' to close parenthesis")?;
                inner.kind
            }
            TokenKind::LeftBracket => self.array_init()?,
            TokenKind::LeftBrace => self.object_init()?,
            TokenKind::Minus | TokenKind::Plus | TokenKind::Bang | TokenKind::Tilde => {
                let op = match self.advance().kind {
                    TokenKind::Minus => UnaryOp::Neg,
                    TokenKind::Plus => UnaryOp::Plus,
                    TokenKind::Bang => UnaryOp::Not,
                    _ => UnaryOp::BitNot,
                };
                let operand = self.expression(Precedence::Prefix)?;
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(operand),
                }
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = self.advance().kind == TokenKind::PlusPlus;
                let operand = self.expression(Precedence::Prefix)?;
                ExpressionKind::Update {
                    target: self.require_reference(operand, "incremented or decremented")?,
                    increment,
                    prefix: true,
                }
            }
            TokenKind::Function => self.function_literal()?,
            TokenKind::Import => {
                self.advance();
                self.expect(TokenKind::LeftParen, "'(' after 'import'")?;
                let token = self.advance();
                let name = match token.kind {
                    TokenKind::String(name) => name,
                    other => {
                        return Err(ParseError::new(
                            format!("Expected a library name string, found {}", other),
                            token.span,
                        ))
                    }
                };
                self.expect(TokenKind::RightParen, "')' after library name")?;
                ExpressionKind::Import(name)
            }
            other => {
                return Err(self.error_here(format!("Expected an expression, found {}", other)));
            }
        };
        Ok(Expression::new(kind, start.to(&self.previous().span)))
    }

    fn infix(&mut self, left: Expression, precedence: Precedence) -> ParseResult<Expression> {
        let start = left.span.clone();
        let operator = self.advance();
        let kind = match operator.kind {
            TokenKind::Assign => {
                let target = self.require_reference(left, "assigned to")?;
                let value = self.expression(Precedence::Lowest)?;
                ExpressionKind::Assign {
                    target,
                    op: None,
                    value: Box::new(value),
                }
            }
            TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign
            | TokenKind::PercentAssign
            | TokenKind::AndAssign
            | TokenKind::OrAssign
            | TokenKind::XorAssign
            | TokenKind::ShiftLeftAssign
            | TokenKind::ShiftRightAssign => {
                let target = self.require_reference(left, "assigned to")?;
                let value = self.expression(Precedence::Lowest)?;
                ExpressionKind::Assign {
                    target,
                    op: binary_op(&operator.kind),
                    value: Box::new(value),
                }
            }
            TokenKind::DoubleAnd | TokenKind::DoubleOr => {
                let op = if operator.kind == TokenKind::DoubleAnd {
                    LogicalOp::And
                } else {
                    LogicalOp::Or
                };
                let right = self.expression(precedence)?;
                ExpressionKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            TokenKind::Is => {
                let token = self.advance();
                let name = match &token.kind {
                    TokenKind::Word(word) => word.clone(),
                    other => other.symbol().unwrap_or_default().to_string(),
                };
                let kind = ValueKind::from_name(&name).ok_or_else(|| {
                    ParseError::new(
                        format!(
                            "Unknown type '{}' (expected object, array, string, number, boolean, null or function)",
                            token.kind
                        ),
                        token.span.clone(),
                    )
                })?;
                ExpressionKind::Is {
                    value: Box::new(left),
                    kind,
                }
            }
            TokenKind::StarStar => {
                let right = self.expression(Precedence::Product)?;
                ExpressionKind::Binary {
                    op: BinaryOp::Pow,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            TokenKind::LeftParen => {
                let args = self.arguments()?;
                ExpressionKind::Call {
                    callee: Box::new(left),
                    args,
                }
            }
            TokenKind::LeftBracket => {
                let index = self.parse_expression()?;
                self.expect(TokenKind::RightBracket, "']' after index")?;
                ExpressionKind::Reference(Reference {
                    kind: ReferenceKind::Index {
                        target: Box::new(left),
                        index: Box::new(index),
                    },
                    span: start.to(&self.previous().span),
                })
            }
            TokenKind::Dot => {
                let name = self.property_name()?;
                ExpressionKind::Reference(Reference {
                    kind: ReferenceKind::Property {
                        target: Box::new(left),
                        name,
                    },
                    span: start.to(&self.previous().span),
                })
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => ExpressionKind::Update {
                target: self.require_reference(left, "incremented or decremented")?,
                increment: operator.kind == TokenKind::PlusPlus,
                prefix: false,
            },
            other => match binary_op(&other) {
                Some(op) => {
                    let right = self.expression(precedence)?;
                    ExpressionKind::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                }
                None => {
                    return Err(ParseError::new(
                        format!("Unexpected operator {}", other),
                        operator.span,
                    ))
                }
            },
        };
        Ok(Expression::new(kind, start.to(&self.previous().span)))
    }

    fn require_reference(&self, expression: Expression, action: &str) -> ParseResult<Reference> {
        expression.into_reference().map_err(|expression| {
            ParseError::new(
                format!(
                    "Only variables, properties and indices can be {}",
                    action
                ),
                expression.span,
            )
        })
    }

    /// Arguments after the opening `(`
    fn arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "')' after arguments")?;
        Ok(args)
    }

    /// Property names may be words, quoted words or keywords
    fn property_name(&mut self) -> ParseResult<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Word(name) | TokenKind::String(name) => Ok(name),
            other if other.is_keyword() => Ok(other.symbol().unwrap_or_default().to_string()),
            other => Err(ParseError::new(
                format!("Expected a property name after '.', found {}", other),
                token.span,
            )),
        }
    }

    fn array_init(&mut self) -> ParseResult<ExpressionKind> {
        self.advance();
        let mut items = Vec::new();
        while !self.check(&TokenKind::RightBracket) {
            items.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBracket, "',' or ']' in array")?;
        Ok(ExpressionKind::ArrayInit(items))
    }

    fn object_init(&mut self) -> ParseResult<ExpressionKind> {
        self.advance();
        let mut entries: Vec<(String, Expression)> = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key_token = self.peek().clone();
            let key = self.property_name().map_err(|_| {
                ParseError::new(
                    format!("Expected an object key, found {}", key_token.kind),
                    key_token.span.clone(),
                )
            })?;
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(ParseError::new(
                    format!("Duplicate object key '{}'", key),
                    key_token.span,
                ));
            }
            self.expect(TokenKind::Colon, "':' after object key")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace, "',' or '}' in object")?;
        Ok(ExpressionKind::ObjectInit(entries))
    }

    /// `function (params) { ... }` or `function (params) -> expr`
    fn function_literal(&mut self) -> ParseResult<ExpressionKind> {
        let start = self.advance().span;
        let params = self.parse_parameters()?;
        let body = if self.match_token(&TokenKind::Arrow) {
            let outer_loops = std::mem::take(&mut self.loop_depth);
            let body = self.parse_expression();
            self.loop_depth = outer_loops;
            FunctionBody::Expression(body?)
        } else {
            FunctionBody::Block(self.parse_function_block()?)
        };
        Ok(ExpressionKind::Function(Arc::new(FunctionDef {
            name: None,
            params,
            body,
            span: start.to(&self.previous().span),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn expr(source: &str) -> Expression {
        let mut parser = Parser::new(lex(source, "test").unwrap());
        let expression = parser.parse_expression().unwrap();
        assert!(parser.is_at_end(), "trailing tokens in {:?}", source);
        expression
    }

    fn expr_err(source: &str) -> ParseError {
        let mut parser = Parser::new(lex(source, "test").unwrap());
        parser.parse_expression().unwrap_err()
    }

    /// Fully parenthesized rendering, for checking structure
    fn show(expression: &Expression) -> String {
        match &expression.kind {
            ExpressionKind::Literal(Literal::Number(n)) => n.to_string(),
            ExpressionKind::Literal(Literal::Boolean(b)) => b.to_string(),
            ExpressionKind::Reference(reference) => match &reference.kind {
                ReferenceKind::Variable(name) => format!("${}", name),
                ReferenceKind::Root(name) => name.clone(),
                ReferenceKind::Property { target, name } => format!("{}.{}", show(target), name),
                ReferenceKind::Index { target, index } => {
                    format!("{}[{}]", show(target), show(index))
                }
            },
            ExpressionKind::Unary { op, operand } => format!("({:?} {})", op, show(operand)),
            ExpressionKind::Binary { op, left, right } => {
                format!("({} {} {})", show(left), op, show(right))
            }
            ExpressionKind::Logical { op, left, right } => {
                format!("({} {:?} {})", show(left), op, show(right))
            }
            ExpressionKind::Assign { target, op, value } => {
                let target = Expression::new(
                    ExpressionKind::Reference(target.clone()),
                    target.span.clone(),
                );
                format!("({} ={:?} {})", show(&target), op, show(value))
            }
            ExpressionKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(show).collect();
                format!("{}({})", show(callee), args.join(", "))
            }
            ExpressionKind::Is { value, kind } => format!("({} is {})", show(value), kind),
            other => format!("{:?}", other),
        }
    }

    #[test]
    fn test_product_binds_tighter_than_sum() {
        assert_eq!(show(&expr("1 + 2 * 3")), "(1 + (2 * 3))");
        assert_eq!(show(&expr("1 * 2 + 3 * 4")), "((1 * 2) + (3 * 4))");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(show(&expr("-1 - 2")), "((Neg 1) - 2)");
        assert_eq!(show(&expr("8 / 4 / 2")), "((8 / 4) / 2)");
    }

    #[test]
    fn test_right_associativity() {
        assert_eq!(show(&expr("2 ** 3 ** 2")), "(2 ** (3 ** 2))");
        assert_eq!(show(&expr("a = b = 1")), "(a =None (b =None 1))");
    }

    #[test]
    fn test_logical_and_equality() {
        assert_eq!(show(&expr("true == false && true")), "((true == false) And true)");
        assert_eq!(show(&expr("!true == false")), "((Not true) == false)");
        assert_eq!(show(&expr("a || b && c")), "(a Or (b And c))");
    }

    #[test]
    fn test_bitwise_chain() {
        assert_eq!(show(&expr("a | b ^ c & d")), "(a | (b ^ (c & d)))");
        assert_eq!(show(&expr("1 << 2 + 3")), "(1 << (2 + 3))");
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(show(&expr("a.b[0].c(1, $x)")), "a.b[0].c(1, $x)");
    }

    #[test]
    fn test_compound_assignment() {
        assert_eq!(show(&expr("x += 1 + 2")), "(x =Some(Add) (1 + 2))");
    }

    #[test]
    fn test_is_and_in() {
        assert_eq!(show(&expr("x is null")), "(x is null)");
        assert_eq!(show(&expr("f is function")), "(f is function)");
        assert_eq!(show(&expr("1 in xs == true")), "((1 in xs) == true)");
        assert!(expr_err("x is banana").message.contains("Unknown type"));
    }

    #[test]
    fn test_assignment_to_non_reference() {
        let err = expr_err("1 = 2");
        assert!(err.message.contains("assigned to"));
        assert_eq!(err.span.unwrap().from.column, 1);
        assert!(expr_err("f() += 1").message.contains("assigned to"));
        assert!(expr_err("(a + b)++").message.contains("incremented"));
        assert!(expr_err("++3").message.contains("incremented"));
    }

    #[test]
    fn test_update_expressions() {
        assert!(matches!(
            expr("x++").kind,
            ExpressionKind::Update { increment: true, prefix: false, .. }
        ));
        assert!(matches!(
            expr("--a[0]").kind,
            ExpressionKind::Update { increment: false, prefix: true, .. }
        ));
    }

    #[test]
    fn test_object_and_array_initializers() {
        match expr("{ a: 1, \"b c\": [1, 2,], 'if': {} }").kind {
            ExpressionKind::ObjectInit(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, vec!["a", "b c", "if"]);
            }
            other => panic!("Expected ObjectInit, got {:?}", other),
        }
        assert!(expr_err("{ a: 1, a: 2 }").message.contains("Duplicate object key"));
    }

    #[test]
    fn test_function_literals() {
        match expr("function(a, this) -> a + 1").kind {
            ExpressionKind::Function(def) => {
                assert_eq!(def.params.len(), 2);
                assert!(matches!(def.body, FunctionBody::Expression(_)));
            }
            other => panic!("Expected Function, got {:?}", other),
        }
        assert!(matches!(
            expr("function() { return 1; }").kind,
            ExpressionKind::Function(_)
        ));
    }

    #[test]
    fn test_import_expression() {
        assert_eq!(expr("import(\"math\")").kind, ExpressionKind::Import("math".into()));
    }

    #[test]
    fn test_nesting_limit() {
        // Debug builds need more than the default test stack to reach the limit
        std::thread::Builder::new()
            .stack_size(32 * 1024 * 1024)
            .spawn(|| {
                let deep = format!("{}1{}", "(".repeat(300), ")".repeat(300));
                let err = expr_err(&deep);
                assert!(err.message.contains("nested too deeply"));
                let fine = format!("{}1{}", "(".repeat(50), ")".repeat(50));
                expr(&fine);
            })
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_spans_cover_operands() {
        let e = expr("aa + bbb");
        assert_eq!(e.span.from.column, 1);
        assert_eq!(e.span.to.column, 9);
    }
}
