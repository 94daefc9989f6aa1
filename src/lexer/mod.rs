//! Lexical analysis
//!
//! Converts source text into a flat stream of positioned tokens. Operators are
//! matched greedily against a trie, identifiers against a fixed keyword table.

mod operators;
mod scanner;
mod span;
mod token;

pub use operators::{OperatorTrie, OPERATOR_TRIE};
pub use scanner::{lex, Scanner, TAB_WIDTH};
pub use span::{SourcePos, SourceSpan};
pub use token::{Token, TokenKind};
