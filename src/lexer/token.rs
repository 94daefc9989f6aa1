use super::span::SourceSpan;
use serde::Serialize;

/// A single token from the source code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    /// The type of token
    pub kind: TokenKind,
    /// Where the token came from
    pub span: SourceSpan,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(kind: TokenKind, span: SourceSpan) -> Self {
        Token { kind, span }
    }
}

/// All possible token types
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    // Literals
    /// Number literal (always a double)
    Number(f64),
    /// Double-quoted string literal
    String(String),

    // Identifiers
    /// Identifier that is not a keyword (also produced by single-quoted strings)
    Word(String),
    /// Variable name (prefixed with $, stored without it)
    Variable(String),

    // Keywords
    /// `var`
    Var,
    /// `val`
    Val,
    /// `function`
    Function,
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `foreach`
    Foreach,
    /// `in`
    In,
    /// `is`
    Is,
    /// `delete`
    Delete,
    /// `return`
    Return,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `import`
    Import,
    /// `as`
    As,
    /// `apply`
    Apply,
    /// `this`
    This,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `**`
    StarStar,
    /// `!`
    Bang,
    /// `~`
    Tilde,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `&&`
    DoubleAnd,
    /// `||`
    DoubleOr,
    /// `=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `-=`
    MinusAssign,
    /// `*=`
    StarAssign,
    /// `/=`
    SlashAssign,
    /// `%=`
    PercentAssign,
    /// `&=`
    AndAssign,
    /// `|=`
    OrAssign,
    /// `^=`
    XorAssign,
    /// `<<=`
    ShiftLeftAssign,
    /// `>>=`
    ShiftRightAssign,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `->`
    Arrow,

    // Delimiters
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `;`
    Semicolon,
    /// `:`
    Colon,
    /// `@` (metadata tag)
    At,

    // Special
    /// End of file marker
    Eof,
}

impl TokenKind {
    /// Check if token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Val
                | TokenKind::Function
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::In
                | TokenKind::Is
                | TokenKind::Delete
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Import
                | TokenKind::As
                | TokenKind::Apply
                | TokenKind::This
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    /// Get keyword from string (exact match against the keyword table)
    pub fn keyword(s: &str) -> Option<TokenKind> {
        let kind = match s {
            "var" => TokenKind::Var,
            "val" => TokenKind::Val,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "foreach" => TokenKind::Foreach,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "delete" => TokenKind::Delete,
            "return" => TokenKind::Return,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "apply" => TokenKind::Apply,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// Source text of fixed tokens (operators, delimiters and keywords)
    pub fn symbol(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Var => "var",
            TokenKind::Val => "val",
            TokenKind::Function => "function",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Foreach => "foreach",
            TokenKind::In => "in",
            TokenKind::Is => "is",
            TokenKind::Delete => "delete",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Import => "import",
            TokenKind::As => "as",
            TokenKind::Apply => "apply",
            TokenKind::This => "this",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::StarStar => "**",
            TokenKind::Bang => "!",
            TokenKind::Tilde => "~",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::ShiftLeft => "<<",
            TokenKind::ShiftRight => ">>",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::DoubleAnd => "&&",
            TokenKind::DoubleOr => "||",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::AndAssign => "&=",
            TokenKind::OrAssign => "|=",
            TokenKind::XorAssign => "^=",
            TokenKind::ShiftLeftAssign => "<<=",
            TokenKind::ShiftRightAssign => ">>=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Arrow => "->",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::At => "@",
            TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::Word(_)
            | TokenKind::Variable(_)
            | TokenKind::Eof => return None,
        };
        Some(text)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s.escape_default()),
            TokenKind::Word(w) => write!(f, "{}", w),
            TokenKind::Variable(name) => write!(f, "${}", name),
            TokenKind::Eof => write!(f, "end of file"),
            other => match other.symbol() {
                Some(text) => write!(f, "'{}'", text),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection() {
        assert_eq!(TokenKind::keyword("if"), Some(TokenKind::If));
        assert_eq!(TokenKind::keyword("foreach"), Some(TokenKind::Foreach));
        assert_eq!(TokenKind::keyword("null"), Some(TokenKind::Null));
        assert_eq!(TokenKind::keyword("If"), None);
        assert_eq!(TokenKind::keyword("not_a_keyword"), None);
    }

    #[test]
    fn test_is_keyword() {
        assert!(TokenKind::If.is_keyword());
        assert!(TokenKind::Apply.is_keyword());
        assert!(!TokenKind::Number(42.0).is_keyword());
        assert!(!TokenKind::Word("test".to_string()).is_keyword());
        assert!(!TokenKind::DoubleAnd.is_keyword());
    }

    #[test]
    fn test_keyword_table_round_trips_symbol() {
        for word in ["var", "val", "delete", "apply", "this", "as"] {
            let kind = TokenKind::keyword(word).unwrap();
            assert_eq!(kind.symbol(), Some(word));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenKind::Variable("x".into()).to_string(), "$x");
        assert_eq!(TokenKind::ShiftLeftAssign.to_string(), "'<<='");
        assert_eq!(TokenKind::Eof.to_string(), "end of file");
    }
}
