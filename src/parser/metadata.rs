//! `@key value;` header tags
//!
//! Each key has its own value parser. The registry only knows how to read the
//! value; what a tag means (e.g. which files `target` selects) is up to the host.

use super::parser::Parser;
use crate::error::{ParseError, ParseResult};
use crate::lexer::TokenKind;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Reads the value of one metadata tag; the parser is positioned just after the key
pub type MetadataParser = fn(&mut Parser<'_>) -> ParseResult<JsonValue>;

/// Parsed metadata tags in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: IndexMap<String, JsonValue>,
}

impl Metadata {
    /// Value of a tag, if present
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    /// Declared schema version
    pub fn version(&self) -> Option<f64> {
        self.get("version").and_then(JsonValue::as_f64)
    }

    /// Target selector, uninterpreted
    pub fn target(&self) -> Option<&JsonValue> {
        self.get("target")
    }

    /// Whether the tag was given
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no tags were given
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tags in source order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.entries.iter()
    }

    pub(crate) fn insert(&mut self, key: String, value: JsonValue) {
        self.entries.insert(key, value);
    }
}

/// Key → value parser table
#[derive(Clone)]
pub struct MetadataRegistry {
    parsers: HashMap<String, MetadataParser>,
}

impl MetadataRegistry {
    /// Registry without any keys
    pub fn empty() -> Self {
        MetadataRegistry {
            parsers: HashMap::new(),
        }
    }

    /// Registers (or replaces) the parser for `key`
    pub fn register(&mut self, key: impl Into<String>, parser: MetadataParser) {
        self.parsers.insert(key.into(), parser);
    }

    /// Parser for `key`
    pub fn get(&self, key: &str) -> Option<MetadataParser> {
        self.parsers.get(key).copied()
    }
}

impl Default for MetadataRegistry {
    /// Knows `version` and `target`
    fn default() -> Self {
        let mut registry = MetadataRegistry::empty();
        registry.register("version", parse_version);
        registry.register("target", parse_target);
        registry
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.parsers.keys().collect();
        keys.sort();
        f.debug_struct("MetadataRegistry").field("keys", &keys).finish()
    }
}

lazy_static! {
    /// Registry used by [`Parser::new`]
    pub static ref DEFAULT_METADATA: MetadataRegistry = MetadataRegistry::default();
}

/// Only schema version 1 exists
fn parse_version(parser: &mut Parser<'_>) -> ParseResult<JsonValue> {
    let token = parser.advance();
    match token.kind {
        TokenKind::Number(n) if n == 1.0 => Ok(JsonValue::from(1)),
        TokenKind::Number(n) => Err(ParseError::new(
            format!("Unsupported version {}; only version 1 is supported", n),
            token.span,
        )),
        other => Err(ParseError::new(
            format!("Expected a version number, found {}", other),
            token.span,
        )),
    }
}

fn parse_target(parser: &mut Parser<'_>) -> ParseResult<JsonValue> {
    parser.parse_constant()
}
