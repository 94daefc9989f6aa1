//! Host harness configuration

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::runtime::DEFAULT_MAX_CALL_DEPTH;

/// Configuration for parsing and applying patches
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use patchlang::parallel::RunnerConfig;
///
/// let config: RunnerConfig = serde_json::from_str(r#"{ "timeout_ms": 250 }"#).unwrap();
/// assert_eq!(config.timeout.as_millis(), 250);
/// assert!(!config.fail_fast);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Threads used to parse patch files (default: num_cpus)
    pub max_parallelism: usize,
    /// Wall-clock budget of one patch application (default: 5s)
    #[serde(rename = "timeout_ms", deserialize_with = "millis")]
    pub timeout: Duration,
    /// Stack size of parse and evaluation threads (default: 16 MiB)
    pub worker_stack_size: usize,
    /// Nested function call limit (default: 256)
    pub max_call_depth: usize,
    /// Stop a batch at the first failing patch
    pub fail_fast: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            timeout: Duration::from_secs(5),
            worker_stack_size: 16 * 1024 * 1024,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            fail_fast: false,
        }
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_call_depth, 256);
        assert!(config.max_parallelism >= 1);
    }

    #[test]
    fn test_partial_document() {
        let config: RunnerConfig =
            serde_json::from_str(r#"{"fail_fast": true, "max_call_depth": 32}"#).unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.max_call_depth, 32);
        assert_eq!(config.worker_stack_size, 16 * 1024 * 1024);
    }
}
