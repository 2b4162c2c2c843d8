//! Per-run configuration
//!
//! There is no process-wide configuration: every run receives its own
//! [`RunConfig`], either the default one or the value passed to one of the
//! `*_with_config` entry points of [`CompiledGraph`](crate::CompiledGraph).
//!
//! ```rust
//! use stepgraph_core::RunConfig;
//!
//! let config: RunConfig = serde_json::from_str(r#"{"recursion_limit": 10}"#).unwrap();
//! assert_eq!(config.recursion_limit, 10);
//! assert_eq!(config.stream_buffer, RunConfig::default().stream_buffer);
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default maximum number of node executions per run
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Default capacity of the per-run event channel
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Configuration of a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum node executions before the run fails with
    /// [`GraphError::RecursionLimit`](crate::GraphError::RecursionLimit)
    pub recursion_limit: usize,

    /// Capacity of the channel carrying node-emitted events
    pub stream_buffer: usize,

    /// Optional human-readable run name, recorded in tracing spans
    pub run_name: Option<String>,

    /// Free-form tags, recorded in tracing spans
    pub tags: Vec<String>,

    /// Run identifier. A fresh one is generated when unset.
    pub run_id: Option<Uuid>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            run_name: None,
            tags: Vec::new(),
            run_id: None,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity;
        self
    }

    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Copy of this config with `run_id` set, generating one if needed
    pub(crate) fn for_run(&self) -> Self {
        let mut config = self.clone();
        config.run_id.get_or_insert_with(Uuid::new_v4);
        config
    }
}
