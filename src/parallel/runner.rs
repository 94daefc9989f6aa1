//! Timed application of parsed patches to JSON documents
//!
//! Each application runs on its own thread with its own value tree; the
//! caller waits on a oneshot channel under a wall-clock timeout. A patch
//! that times out is abandoned: its thread keeps running until the script
//! finishes, but nothing it produces is observed.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

use super::config::RunnerConfig;
use super::executor::Patch;
use crate::error::{Error, Result};
use crate::library::{Libraries, ScriptLibraries};
use crate::parser::Program;
use crate::runtime::{from_json, to_json, Context, Value};

/// Decides which patches apply to a target document
pub trait PatchSelector {
    /// Whether `patch` should be applied to the document identified by `target_id`
    fn selects(&self, patch: &Patch, target_id: &str) -> bool;
}

impl<F> PatchSelector for F
where
    F: Fn(&Patch, &str) -> bool,
{
    fn selects(&self, patch: &Patch, target_id: &str) -> bool {
        self(patch, target_id)
    }
}

/// A patch that could not be applied
#[derive(Debug)]
pub struct PatchFailure {
    /// Identifier of the failing patch
    pub patch_id: String,
    /// What went wrong
    pub error: Error,
}

/// Result of applying a batch of patches to one document
#[derive(Debug)]
pub struct BatchOutcome {
    /// Document after every successful patch
    pub document: JsonValue,
    /// Identifiers of the patches that were applied, in order
    pub applied: Vec<String>,
    /// Patches that failed; their changes are not part of `document`
    pub failures: Vec<PatchFailure>,
}

impl BatchOutcome {
    /// True when no selected patch failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies patches under the limits of a [`RunnerConfig`]
#[derive(Debug, Clone, Default)]
pub struct PatchRunner {
    config: RunnerConfig,
    scripts: Arc<ScriptLibraries>,
}

impl PatchRunner {
    /// Runner with native libraries only
    pub fn new(config: RunnerConfig) -> Self {
        Self::with_scripts(config, Arc::new(ScriptLibraries::new()))
    }

    /// Runner whose patches may also import the given script libraries
    pub fn with_scripts(config: RunnerConfig, scripts: Arc<ScriptLibraries>) -> Self {
        PatchRunner { config, scripts }
    }

    /// Active configuration
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Applies one patch and returns the patched document.
    ///
    /// `document` is never modified; on any failure the caller still holds
    /// the unpatched value.
    pub async fn apply(&self, patch: &Patch, document: &JsonValue) -> Result<JsonValue> {
        let (sender, receiver) = oneshot::channel();
        let program = patch.program.clone();
        let input = document.clone();
        let scripts = self.scripts.clone();
        let max_call_depth = self.config.max_call_depth;

        std::thread::Builder::new()
            .name(format!("patch-{}", patch.id))
            .stack_size(self.config.worker_stack_size)
            .spawn(move || {
                let result = run_patch(&program, &input, scripts, max_call_depth);
                // The receiver is gone after a timeout
                let _ = sender.send(result);
            })
            .map_err(|e| Error::Spawn(e.to_string()))?;

        match tokio::time::timeout(self.config.timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::WorkerPanicked),
            Err(_) => Err(Error::Timeout(self.config.timeout)),
        }
    }

    /// Applies, in order, every patch the selector accepts for `target_id`.
    ///
    /// Each patch sees the output of the previous successful one. Failures
    /// are collected; with `fail_fast` the batch stops at the first one.
    pub async fn apply_all(
        &self,
        patches: &[Patch],
        target_id: &str,
        document: &JsonValue,
        selector: &dyn PatchSelector,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            document: document.clone(),
            applied: Vec::new(),
            failures: Vec::new(),
        };

        for patch in patches.iter().filter(|p| selector.selects(p, target_id)) {
            match self.apply(patch, &outcome.document).await {
                Ok(patched) => {
                    outcome.document = patched;
                    outcome.applied.push(patch.id.clone());
                }
                Err(error) => {
                    tracing::warn!(patch = %patch.id, document = target_id, %error, "patch failed");
                    outcome.failures.push(PatchFailure {
                        patch_id: patch.id.clone(),
                        error,
                    });
                    if self.config.fail_fast {
                        break;
                    }
                }
            }
        }

        tracing::debug!(
            document = target_id,
            applied = outcome.applied.len(),
            failed = outcome.failures.len(),
            "patch batch finished"
        );
        outcome
    }
}

/// Evaluates `program` against a private copy of `document`
fn run_patch(
    program: &Program,
    document: &JsonValue,
    scripts: Arc<ScriptLibraries>,
    max_call_depth: usize,
) -> Result<JsonValue> {
    let root = match from_json(document) {
        Value::Object(root) => root,
        other => {
            return Err(Error::Json(format!(
                "patch target must be an object, got {}",
                other.type_name()
            )))
        }
    };
    let ctx = Context::with_call_limit(
        root.clone(),
        Libraries::with_scripts(scripts),
        max_call_depth,
    );
    let result = program
        .execute(&ctx)
        .map_err(Error::from)
        .and_then(|()| to_json(&Value::Object(root)));
    ctx.release();
    result
}
