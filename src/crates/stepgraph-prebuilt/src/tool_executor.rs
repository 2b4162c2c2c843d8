//! ToolExecutor - named tool registry with invocation by name
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepgraph_core::{FnTool, Tool};
//! use stepgraph_prebuilt::{ToolExecutor, ToolInvocation};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let search = FnTool::new("search", "Search the web", |args| async move {
//!     Ok(json!([format!("results for {}", args["query"])]))
//! });
//! let executor = ToolExecutor::new([Arc::new(search) as Arc<dyn Tool>])?;
//!
//! let output = executor
//!     .invoke(ToolInvocation::new("search", json!({"query": "rust"})))
//!     .await?;
//! assert_eq!(output, json!(["results for \"rust\""]));
//! # Ok(())
//! # }
//! ```

use crate::error::{PrebuiltError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use stepgraph_core::{Tool, ToolCall, ToolError};

/// A request to run one tool with its input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name
    pub tool: String,

    /// Arguments passed to the tool
    pub tool_input: Value,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, tool_input: Value) -> Self {
        Self {
            tool: tool.into(),
            tool_input,
        }
    }
}

impl From<&ToolCall> for ToolInvocation {
    fn from(call: &ToolCall) -> Self {
        Self::new(call.name.clone(), call.args.clone())
    }
}

/// Registry of tools, executed by name
///
/// Cloning is cheap; clones share the same tools.
#[derive(Clone, Default)]
pub struct ToolExecutor {
    tools: Arc<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolExecutor {
    /// Create an executor over `tools`.
    ///
    /// # Errors
    ///
    /// [`PrebuiltError::DuplicateTool`] when two tools share a name.
    pub fn new(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_string();
            if registry.insert(name.clone(), tool).is_some() {
                return Err(PrebuiltError::DuplicateTool(name));
            }
        }
        Ok(Self {
            tools: Arc::new(registry),
        })
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the tool named by `invocation`.
    ///
    /// # Errors
    ///
    /// [`ToolError::NotFound`] for an unknown tool, or whatever the tool
    /// itself returns.
    pub async fn invoke(&self, invocation: ToolInvocation) -> std::result::Result<Value, ToolError> {
        let Some(tool) = self.get(&invocation.tool) else {
            return Err(ToolError::NotFound {
                tool: invocation.tool,
                available: self.tool_names().join(", "),
            });
        };

        tracing::debug!(tool = %invocation.tool, "invoking tool");
        tool.invoke(invocation.tool_input).await
    }

    /// Run several invocations one after another.
    ///
    /// Results are returned in the order of `invocations`; a failure does not
    /// stop the remaining invocations.
    pub async fn batch(
        &self,
        invocations: impl IntoIterator<Item = ToolInvocation>,
    ) -> Vec<std::result::Result<Value, ToolError>> {
        let mut results = Vec::new();
        for invocation in invocations {
            results.push(self.invoke(invocation).await);
        }
        results
    }
}

impl fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.tool_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepgraph_core::FnTool;

    fn upper() -> Arc<dyn Tool> {
        Arc::new(FnTool::new("upper", "Uppercase text", |args| async move {
            match args["text"].as_str() {
                Some(text) => Ok(json!(text.to_uppercase())),
                None => Err(ToolError::invalid_arguments("upper", "missing 'text'")),
            }
        }))
    }

    fn echo() -> Arc<dyn Tool> {
        Arc::new(FnTool::new("echo", "Echo the input", |args| async move { Ok(args) }))
    }

    #[tokio::test]
    async fn test_invoke_by_name() {
        let executor = ToolExecutor::new([upper(), echo()]).unwrap();
        let output = executor
            .invoke(ToolInvocation::new("upper", json!({"text": "sf"})))
            .await
            .unwrap();
        assert_eq!(output, json!("SF"));
        assert_eq!(executor.tool_names(), vec!["echo", "upper"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_available() {
        let executor = ToolExecutor::new([upper(), echo()]).unwrap();
        let err = executor
            .invoke(ToolInvocation::new("weather", json!({})))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::NotFound {
                tool: "weather".to_string(),
                available: "echo, upper".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let executor = ToolExecutor::new([upper(), echo()]).unwrap();
        let results = executor
            .batch(vec![
                ToolInvocation::new("echo", json!(1)),
                ToolInvocation::new("upper", json!({})),
                ToolInvocation::new("upper", json!({"text": "la"})),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(json!(1)));
        assert!(matches!(results[1], Err(ToolError::InvalidArguments { .. })));
        assert_eq!(results[2], Ok(json!("LA")));
    }

    proptest::proptest! {
        #[test]
        fn prop_batch_keeps_input_order(values in proptest::collection::vec(proptest::num::i64::ANY, 0..16)) {
            let executor = ToolExecutor::new([echo()]).unwrap();
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let invocations = values.iter().map(|v| ToolInvocation::new("echo", json!(v)));

            let outputs: Vec<Value> = runtime
                .block_on(executor.batch(invocations))
                .into_iter()
                .map(|result| result.unwrap())
                .collect();
            proptest::prop_assert_eq!(outputs, values.iter().map(|v| json!(v)).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_duplicate_tool_names() {
        let err = ToolExecutor::new([echo(), echo()]).unwrap_err();
        assert!(matches!(err, PrebuiltError::DuplicateTool(ref name) if name == "echo"));
    }

    #[test]
    fn test_invocation_from_tool_call() {
        let call = ToolCall::new("call_1", "search", json!({"query": "weather in sf"}));
        let invocation = ToolInvocation::from(&call);
        assert_eq!(invocation.tool, "search");
        assert_eq!(
            serde_json::to_value(&invocation).unwrap(),
            json!({"tool": "search", "tool_input": {"query": "weather in sf"}})
        );
    }
}
