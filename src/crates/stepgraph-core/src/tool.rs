//! Tool collaborator contract
//!
//! A tool accepts structured arguments (from a model's tool call) and returns
//! structured or textual output, or a [`ToolError`]. Tools are executed by
//! tool-running nodes, which match each result back to its originating call id.
//!
//! ```rust
//! use stepgraph_core::tool::{FnTool, Tool};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let search = FnTool::new("search", "Look up the weather", |args| async move {
//!     let query = args["query"].as_str().unwrap_or_default().to_string();
//!     Ok(json!([format!("results for {query}")]))
//! });
//!
//! let output = search.invoke(json!({"query": "sf"})).await.unwrap();
//! assert_eq!(output, json!(["results for sf"]));
//! # }
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by tools or tool lookup
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ToolError {
    /// Tool not found in registry
    #[error("tool '{tool}' not found, available tools: {available}")]
    NotFound { tool: String, available: String },

    /// Invalid tool arguments
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Tool execution failed
    #[error("tool '{tool}' execution failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },
}

impl ToolError {
    pub fn execution(tool: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_arguments(tool: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }
}

/// Trait for tools callable by a model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, matched against `ToolCall::name`
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON schema of the arguments
    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    /// Execute the tool
    async fn invoke(&self, args: Value) -> Result<Value, ToolError>;
}

type ToolFn = dyn Fn(Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync;

/// Tool backed by an async closure
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    input_schema: Value,
    func: Arc<ToolFn>,
}

impl FnTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({"type": "object"}),
            func: Arc::new(move |args| Box::pin(func(args))),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        (self.func)(args).await
    }
}
