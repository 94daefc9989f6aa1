//! Parallel parsing of patch files
//!
//! Uses Rayon for work-stealing parallelism, one task per file. Parse tasks
//! share nothing; results come back in input order.

use std::sync::Arc;

use rayon::prelude::*;

use super::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::parser::{parse_source, Metadata, Program};

/// Patch file to be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSource {
    /// Identifier used in spans and reports, usually the file path
    pub id: String,
    /// Script text
    pub text: String,
}

impl PatchSource {
    /// Creates a source from an identifier and its text
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        PatchSource {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Successfully parsed patch, ready to be applied any number of times
#[derive(Debug, Clone)]
pub struct Patch {
    /// Identifier of the source it came from
    pub id: String,
    /// Parsed program
    pub program: Arc<Program>,
}

impl Patch {
    /// Lexes and parses one source
    pub fn parse(source: &PatchSource) -> Result<Patch> {
        let program = parse_source(&source.text, &source.id)?;
        Ok(Patch {
            id: source.id.clone(),
            program: Arc::new(program),
        })
    }

    /// Header tags of the patch
    pub fn metadata(&self) -> &Metadata {
        &self.program.metadata
    }
}

/// Parses every source in parallel on a pool whose threads have
/// `config.worker_stack_size` bytes of stack, even when there is one source
///
/// # Returns
/// * `Ok(results)` - one entry per source, in input order; a file that fails
///   to lex or parse yields its `Error::Lex` or `Error::Parse`
/// * `Err(Error::Spawn)` - the thread pool could not be built
pub fn parse_all(sources: &[PatchSource], config: &RunnerConfig) -> Result<Vec<Result<Patch>>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_parallelism.clamp(1, sources.len()))
        .thread_name(|index| format!("patch-parse-{}", index))
        .stack_size(config.worker_stack_size)
        .build()
        .map_err(|e| Error::Spawn(format!("Failed to create thread pool: {}", e)))?;

    let results: Vec<Result<Patch>> =
        pool.install(|| sources.par_iter().map(Patch::parse).collect());

    let failed = results.iter().filter(|result| result.is_err()).count();
    tracing::debug!(
        files = sources.len(),
        failed,
        "parsed patch files"
    );
    Ok(results)
}
