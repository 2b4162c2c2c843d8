//! ToolNode - graph node that executes the tool calls of the last ai message
//!
//! ```text
//!  messages: [..., ai(tool_calls: [c1, c2])]
//!                     │
//!                     ▼  ToolNode::execute
//!   for each call, in emission order:
//!     tool_start(node, name, args) ─▶ ToolExecutor::invoke ─▶ tool_end(node, name, output)
//!                     │
//!                     ▼
//!  patch: messages: [tool(c1), tool(c2)]
//! ```
//!
//! Calls run one after another, so every `tool_start` is immediately
//! followed by its own `tool_end` on the event stream.
//!
//! # Error handling
//!
//! By default a failing tool becomes a `tool` message whose content is the
//! error text, so the model can see it and adjust. With
//! [`with_error_handling(false)`](ToolNode::with_error_handling) the failure
//! aborts the run as a node execution error.

use crate::error::{PrebuiltError, Result};
use crate::tool_executor::{ToolExecutor, ToolInvocation};
use serde_json::Value;
use std::sync::Arc;
use stepgraph_core::{
    BoxError, Message, MessageRole, NodeAction, NodeContext, State, StreamWriter, Tool, ToolCall,
    END,
};

/// Label returned by [`tools_condition`] when tools must run
pub const TOOLS_LABEL: &str = "tools";

/// Graph node running tool calls
#[derive(Debug, Clone)]
pub struct ToolNode {
    executor: ToolExecutor,
    handle_tool_errors: bool,
}

impl ToolNode {
    pub fn new(executor: ToolExecutor) -> Self {
        Self {
            executor,
            handle_tool_errors: true,
        }
    }

    /// Create a node from a list of tools
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self> {
        Ok(Self::new(ToolExecutor::new(tools)?))
    }

    /// Report tool failures to the model (default: true)
    pub fn with_error_handling(mut self, handle_errors: bool) -> Self {
        self.handle_tool_errors = handle_errors;
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Execute the tool calls of the last message of `state`.
    ///
    /// Returns a patch holding one `tool` message per call, in call order.
    /// An `ai` message without tool calls yields an empty patch.
    ///
    /// # Errors
    ///
    /// [`PrebuiltError::NotAnAiMessage`] when the conversation does not end
    /// with an `ai` message; [`PrebuiltError::Tool`] when a tool fails and
    /// error handling is off.
    pub async fn execute(&self, state: &State, writer: &StreamWriter) -> Result<State> {
        let calls = last_tool_calls(state)?;
        let mut replies = Vec::with_capacity(calls.len());

        for call in calls {
            writer.tool_start(&call.name, &call.args).await;
            let content = match self.executor.invoke(ToolInvocation::from(&call)).await {
                Ok(output) => {
                    writer.tool_end(&call.name, &output).await;
                    render(output)
                }
                Err(error) if self.handle_tool_errors => {
                    tracing::warn!(
                        tool = %call.name,
                        call_id = %call.id,
                        error = %error,
                        "tool failed, returning the error to the model"
                    );
                    let text = format!("Error: {error}");
                    writer.tool_end(&call.name, &Value::String(text.clone())).await;
                    text
                }
                Err(error) => return Err(error.into()),
            };
            replies.push(Message::tool(content, call.id).with_name(call.name));
        }

        Ok(State::from_messages(replies)?)
    }
}

impl From<ToolNode> for NodeAction {
    fn from(node: ToolNode) -> Self {
        NodeAction::from_async(move |state: State, ctx: NodeContext| {
            let node = node.clone();
            async move {
                node.execute(&state, ctx.writer())
                    .await
                    .map_err(BoxError::from)
            }
        })
    }
}

fn last_tool_calls(state: &State) -> Result<Vec<ToolCall>> {
    match state.last_message()? {
        Some(message) if message.role == MessageRole::Ai => Ok(message.tool_calls),
        Some(message) => Err(PrebuiltError::NotAnAiMessage(message.role.to_string())),
        None => Err(PrebuiltError::NotAnAiMessage("an empty conversation".to_string())),
    }
}

fn render(output: Value) -> String {
    match output {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Route to [`TOOLS_LABEL`] when the last message requests tool calls,
/// otherwise to [`END`].
pub fn tools_condition(state: &State) -> std::result::Result<String, BoxError> {
    let wants_tools = state
        .last_message()?
        .is_some_and(|message| message.has_tool_calls());
    Ok(if wants_tools { TOOLS_LABEL } else { END }.to_string())
}
