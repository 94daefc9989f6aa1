//! Host harness: parallel parsing and timed patch application
//!
//! Parsing is spread over a Rayon pool. Each patch application gets its own
//! thread and value tree and is bounded by a wall-clock timeout.

mod config;
mod executor;
mod runner;

pub use config::RunnerConfig;
pub use executor::{parse_all, Patch, PatchSource};
pub use runner::{BatchOutcome, PatchFailure, PatchRunner, PatchSelector};
