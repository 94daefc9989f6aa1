//! # Patchlang - a sandboxed scripting language for patching JSON documents
//!
//! Patchlang scripts run at load time against a JSON document and change it
//! in place: bare identifiers address properties of the document, `$name`
//! addresses script variables, and a small set of native libraries covers
//! text, collections and math. Scripts cannot reach the file system, the
//! network or the host process.
//!
//! ## Quick Start
//!
//! ```rust
//! use patchlang::{parse_source, Context, Libraries, Value};
//!
//! # fn main() -> patchlang::Result<()> {
//! let program = parse_source("var $x = 1; x = x + 2;", "example.patch")?;
//!
//! let root = Value::new_object();
//! let ctx = Context::new(root.clone(), Libraries::standard());
//! program.execute(&ctx)?;
//!
//! assert_eq!(root.borrow()["x"], Value::Number(3.0));
//!
//! // Breaks the reference cycles script functions form with their scopes
//! ctx.release();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → lexer → Tokens → parser → Program → evaluator → patched root
//! ```
//!
//! - [`lexer`] - position-tracking scanner with greedy operator matching
//! - [`parser`] - recursive descent statements, precedence-climbing
//!   expressions, statement-level error recovery
//! - [`runtime`] - values, scopes, operator semantics, evaluator, JSON bridge
//! - [`library`] - native function binding, standard libraries, script
//!   libraries and `import` resolution
//! - [`parallel`] - host harness: parallel parsing and timed application
//!
//! ## Applying patches from a host
//!
//! ```rust
//! use patchlang::parallel::{parse_all, PatchRunner, PatchSource, RunnerConfig};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> patchlang::Result<()> {
//! let config = RunnerConfig::default();
//! let sources = vec![PatchSource::new("bump.patch", "version += 1;")];
//! let patches = parse_all(&sources, &config)?;
//! let patch = patches.into_iter().next().unwrap()?;
//!
//! let runner = PatchRunner::new(config);
//! let patched = runner.apply(&patch, &json!({"version": 1})).await?;
//! assert_eq!(patched, json!({"version": 2}));
//! # Ok(())
//! # }
//! ```

#![allow(clippy::module_inception)]

/// Version of the patchlang crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod lexer;
pub mod library;
pub mod parallel;
pub mod parser;
pub mod runtime;

// Re-export main types
pub use error::{Error, EvalErrorKind, EvaluationError, LexError, ParseError, Result};
pub use lexer::{lex, SourcePos, SourceSpan, Token, TokenKind};
pub use library::{Libraries, LibraryLocator, ScriptLibraries};
pub use parser::{parse_source, Parser, Program};
pub use runtime::{from_json, to_json, Context, Value};
