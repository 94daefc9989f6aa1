use super::operators::OPERATOR_TRIE;
use super::span::{SourcePos, SourceSpan};
use super::token::{Token, TokenKind};
use crate::error::LexError;
use std::sync::Arc;

/// Columns a tab advances to (the next multiple of this, plus one)
pub const TAB_WIDTH: usize = 4;

/// Scanner for patch script source text
pub struct Scanner {
    /// Source code as character vector
    source: Vec<char>,
    /// File name used in every span
    file: Arc<str>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Line where the current token starts
    start_line: usize,
    /// Column where the current token starts
    start_column: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
}

impl Scanner {
    /// Creates a new scanner over `source`, attributing tokens to `file`
    pub fn new(source: &str, file: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            file: Arc::from(file),
            tokens: Vec::new(),
            start: 0,
            start_line: 1,
            start_column: 1,
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, LexError> {
        while self.skip_trivia() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token()?;
        }

        let end = self.pos();
        self.tokens
            .push(Token::new(TokenKind::Eof, SourceSpan::new(end.clone(), end)));
        Ok(self.tokens)
    }

    /// Skips whitespace and comments; returns false at end of input
    fn skip_trivia(&mut self) -> bool {
        while !self.is_at_end() {
            match self.peek() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.advance();
                }
                '#' => {
                    while !self.is_at_end() && self.peek() != '\n' {
                        self.advance();
                    }
                }
                _ => return true,
            }
        }
        false
    }

    fn scan_token(&mut self) -> Result<(), LexError> {
        let c = self.peek();

        match c {
            '"' => self.scan_string('"'),
            '\'' => self.scan_string('\''),
            '$' => {
                self.advance();
                if !is_word_start(self.peek()) {
                    return Err(self.error_here("Expected a variable name after '$'"));
                }
                let name = self.scan_word();
                self.add_token(TokenKind::Variable(name));
                Ok(())
            }
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_word_start(c) => {
                let word = self.scan_word();
                let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Word(word));
                self.add_token(kind);
                Ok(())
            }
            c if OPERATOR_TRIE.starts_with(c) => {
                let (kind, len) = OPERATOR_TRIE
                    .longest_match(&self.source[self.current..])
                    .ok_or_else(|| self.error_here(format!("Unexpected character '{}'", c)))?;
                for _ in 0..len {
                    self.advance();
                }
                self.add_token(kind);
                Ok(())
            }
            _ => Err(self.error_here(format!(
                "Unexpected character '{}'",
                c.escape_default()
            ))),
        }
    }

    fn scan_word(&mut self) -> String {
        let begin = self.current;
        while is_word_part(self.peek()) {
            self.advance();
        }
        self.source[begin..self.current].iter().collect()
    }

    /// Double quotes produce string tokens, single quotes produce word tokens
    fn scan_string(&mut self, quote: char) -> Result<(), LexError> {
        self.advance(); // Opening quote
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(LexError::new(
                    "Unterminated string literal",
                    self.start_pos(),
                ));
            }
            let c = self.peek();
            if c == quote {
                self.advance();
                break;
            }
            match c {
                '\n' => {
                    return Err(self.error_here(
                        "Line break inside string literal (did you forget a quote?)",
                    ));
                }
                '\\' => {
                    let escape_pos = self.pos();
                    self.advance();
                    value.push(self.scan_escape(escape_pos)?);
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        if quote == '"' {
            self.add_token(TokenKind::String(value));
        } else {
            self.add_token(TokenKind::Word(value));
        }
        Ok(())
    }

    fn scan_escape(&mut self, escape_pos: SourcePos) -> Result<char, LexError> {
        if self.is_at_end() {
            return Err(LexError::new("Unterminated string literal", self.start_pos()));
        }
        let escaped = self.advance();
        let c = match escaped {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            '0' => '\0',
            '"' => '"',
            '\'' => '\'',
            '\\' => '\\',
            'x' => self.scan_hex_escape(2, escape_pos)?,
            'u' => self.scan_hex_escape(4, escape_pos)?,
            other => {
                return Err(LexError::new(
                    format!("Invalid escape sequence \\{}", other.escape_default()),
                    escape_pos,
                ));
            }
        };
        Ok(c)
    }

    fn scan_hex_escape(&mut self, digits: usize, escape_pos: SourcePos) -> Result<char, LexError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self.peek().to_digit(16).ok_or_else(|| {
                LexError::new(
                    format!("Escape sequence expects {} hexadecimal digits", digits),
                    escape_pos.clone(),
                )
            })?;
            self.advance();
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| {
            LexError::new(
                format!("Escape sequence \\u{:04X} is not a valid character", code),
                escape_pos,
            )
        })
    }

    fn scan_number(&mut self) -> Result<(), LexError> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume .
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let value: f64 = text
            .parse()
            .map_err(|_| LexError::new(format!("Invalid number: {}", text), self.start_pos()))?;
        self.add_token(TokenKind::Number(value));
        Ok(())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.column = 1;
            }
            '\t' => self.column += TAB_WIDTH - (self.column - 1) % TAB_WIDTH,
            _ => self.column += 1,
        }
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.file.clone(), self.line, self.column)
    }

    fn start_pos(&self) -> SourcePos {
        SourcePos::new(self.file.clone(), self.start_line, self.start_column)
    }

    fn error_here(&self, message: impl Into<String>) -> LexError {
        LexError::new(message, self.pos())
    }

    fn add_token(&mut self, kind: TokenKind) {
        let span = SourceSpan::new(self.start_pos(), self.pos());
        self.tokens.push(Token::new(kind, span));
    }
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_word_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenizes `source`, attributing every span to `file`
pub fn lex(source: &str, file: &str) -> Result<Vec<Token>, LexError> {
    Scanner::new(source, file).scan_tokens()
}
