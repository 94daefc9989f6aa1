//! Greedy longest-match lookup of operator and delimiter tokens

use super::token::TokenKind;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Every fixed punctuation token the scanner recognizes
const OPERATORS: &[TokenKind] = &[
    TokenKind::LeftParen,
    TokenKind::RightParen,
    TokenKind::LeftBrace,
    TokenKind::RightBrace,
    TokenKind::LeftBracket,
    TokenKind::RightBracket,
    TokenKind::Comma,
    TokenKind::Dot,
    TokenKind::Semicolon,
    TokenKind::Colon,
    TokenKind::At,
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Star,
    TokenKind::Slash,
    TokenKind::Percent,
    TokenKind::StarStar,
    TokenKind::Bang,
    TokenKind::Tilde,
    TokenKind::Ampersand,
    TokenKind::Pipe,
    TokenKind::Caret,
    TokenKind::ShiftLeft,
    TokenKind::ShiftRight,
    TokenKind::Lt,
    TokenKind::Gt,
    TokenKind::LtEq,
    TokenKind::GtEq,
    TokenKind::Eq,
    TokenKind::NotEq,
    TokenKind::DoubleAnd,
    TokenKind::DoubleOr,
    TokenKind::Assign,
    TokenKind::PlusAssign,
    TokenKind::MinusAssign,
    TokenKind::StarAssign,
    TokenKind::SlashAssign,
    TokenKind::PercentAssign,
    TokenKind::AndAssign,
    TokenKind::OrAssign,
    TokenKind::XorAssign,
    TokenKind::ShiftLeftAssign,
    TokenKind::ShiftRightAssign,
    TokenKind::PlusPlus,
    TokenKind::MinusMinus,
    TokenKind::Arrow,
];

/// Node of the operator trie, keyed by character
#[derive(Debug, Default)]
pub struct OperatorTrie {
    token: Option<TokenKind>,
    children: HashMap<char, OperatorTrie>,
}

impl OperatorTrie {
    fn insert(&mut self, text: &str, kind: TokenKind) {
        let mut node = self;
        for c in text.chars() {
            node = node.children.entry(c).or_default();
        }
        node.token = Some(kind);
    }

    /// Whether any operator starts with `c`
    pub fn starts_with(&self, c: char) -> bool {
        self.children.contains_key(&c)
    }

    /// Longest operator that prefixes `input`, with its length in characters.
    ///
    /// Walks as deep as the input allows and falls back to the deepest node
    /// that terminates an operator, so `&&=` yields `&&` (2) rather than failing.
    pub fn longest_match(&self, input: &[char]) -> Option<(TokenKind, usize)> {
        let mut node = self;
        let mut best = None;
        for (depth, c) in input.iter().enumerate() {
            match node.children.get(c) {
                Some(child) => {
                    node = child;
                    if let Some(kind) = &node.token {
                        best = Some((kind.clone(), depth + 1));
                    }
                }
                None => break,
            }
        }
        best
    }
}

lazy_static! {
    /// Trie over every operator in the language
    pub static ref OPERATOR_TRIE: OperatorTrie = {
        let mut trie = OperatorTrie::default();
        for kind in OPERATORS {
            if let Some(text) = kind.symbol() {
                trie.insert(text, kind.clone());
            }
        }
        trie
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(text: &str) -> Option<(TokenKind, usize)> {
        let chars: Vec<char> = text.chars().collect();
        OPERATOR_TRIE.longest_match(&chars)
    }

    #[test]
    fn test_single_characters() {
        assert_eq!(first("+"), Some((TokenKind::Plus, 1)));
        assert_eq!(first("@key"), Some((TokenKind::At, 1)));
        assert_eq!(first("a"), None);
    }

    #[test]
    fn test_longest_match_wins() {
        assert_eq!(first("<<="), Some((TokenKind::ShiftLeftAssign, 3)));
        assert_eq!(first("**"), Some((TokenKind::StarStar, 2)));
        assert_eq!(first("->x"), Some((TokenKind::Arrow, 2)));
    }

    #[test]
    fn test_backtracks_to_deepest_terminal() {
        // `&&` has no `=` child, so the walk stops and keeps `&&`
        assert_eq!(first("&&="), Some((TokenKind::DoubleAnd, 2)));
        assert_eq!(first("||="), Some((TokenKind::DoubleOr, 2)));
        // `**=` is not an operator: `**` then `=`
        assert_eq!(first("**="), Some((TokenKind::StarStar, 2)));
    }

    #[test]
    fn test_greedy_boundaries() {
        use TokenKind::*;
        let cases: &[(&str, &[TokenKind])] = &[
            ("+++", &[PlusPlus, Plus]),
            ("+=+", &[PlusAssign, Plus]),
            ("--=", &[MinusMinus, Assign]),
            ("->-", &[Arrow, Minus]),
            ("-=>", &[MinusAssign, Gt]),
            ("*=*", &[StarAssign, Star]),
            ("**=", &[StarStar, Assign]),
            ("/==", &[SlashAssign, Assign]),
            ("%==", &[PercentAssign, Assign]),
            ("&&&", &[DoubleAnd, Ampersand]),
            ("&=", &[AndAssign]),
            ("|||", &[DoubleOr, Pipe]),
            ("|=", &[OrAssign]),
            ("^==", &[XorAssign, Assign]),
            ("!==", &[NotEq, Assign]),
            ("!!", &[Bang, Bang]),
            ("<<=<", &[ShiftLeftAssign, Lt]),
            ("<=<", &[LtEq, Lt]),
            (">>=", &[ShiftRightAssign]),
            (">=>", &[GtEq, Gt]),
            (">>>", &[ShiftRight, Gt]),
            ("===", &[Eq, Assign]),
            ("~~", &[Tilde, Tilde]),
        ];
        for (source, expected) in cases {
            let kinds: Vec<TokenKind> = crate::lexer::lex(source, "test")
                .unwrap()
                .into_iter()
                .map(|token| token.kind)
                .collect();
            let mut expected = expected.to_vec();
            expected.push(Eof);
            assert_eq!(kinds, expected, "tokens of {:?}", source);
        }
    }
}
