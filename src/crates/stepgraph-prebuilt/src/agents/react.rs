//! Tool-calling agent loops
//!
//! Both builders produce the same two-node loop over a message state:
//!
//! ```text
//!            ┌──────────────┐
//!  entry ──▶ │    agent     │ ── no tool calls ──▶ END
//!            └──────────────┘
//!               ▲        │ tool calls
//!               │        ▼
//!            ┌──────────────┐
//!            │ action/tools │
//!            └──────────────┘
//! ```
//!
//! | Builder | Tools node | Router labels |
//! |---------|------------|---------------|
//! | [`create_agent_executor`] | `action` | `continue` / `end` |
//! | [`create_react_agent`] | `tools` | `tools` / `__end__` ([`tools_condition`]) |
//!
//! The agent node streams the model reply token by token when the run is
//! consumed through `run_with_events`, and makes a single `invoke` call
//! otherwise.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepgraph_core::llm::ScriptedChatModel;
//! use stepgraph_core::{FnTool, Message, State, Tool, ToolCall};
//! use stepgraph_prebuilt::create_react_agent;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Arc::new(ScriptedChatModel::new([
//!     Message::ai_tool_calls(vec![ToolCall::new("call_1", "search", json!({"query": "sf"}))]),
//!     Message::ai("It is cloudy in San Francisco."),
//! ]));
//! let search: Arc<dyn Tool> = Arc::new(FnTool::new("search", "Search", |_| async {
//!     Ok(json!(["Cloudy with a chance of hail."]))
//! }));
//!
//! let agent = create_react_agent(model, vec![search])
//!     .with_system_prompt("You are a weather assistant.")
//!     .build()?;
//!
//! let input = State::from_messages(vec![Message::human("weather in sf?")])?;
//! let output = agent.run(input).await?;
//! assert_eq!(output.messages()?.len(), 4);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::tool_node::{tools_condition, ToolNode, TOOLS_LABEL};
use std::sync::Arc;
use stepgraph_core::llm::collect_chat_stream;
use stepgraph_core::{
    BoxError, ChatModel, CompiledGraph, Message, MessageRole, NodeAction, NodeContext, State,
    StateGraph, Tool, END,
};

/// Name of the model-calling node
pub const AGENT_NODE: &str = "agent";

/// Name of the tools node built by [`create_agent_executor`]
pub const ACTION_NODE: &str = "action";

/// Router of [`create_agent_executor`]: `continue` when the last message
/// requests tool calls, `end` otherwise.
pub fn should_continue(state: &State) -> std::result::Result<String, BoxError> {
    let wants_tools = state
        .last_message()?
        .is_some_and(|message| message.has_tool_calls());
    Ok(if wants_tools { "continue" } else { "end" }.to_string())
}

/// Configuration for a ReAct agent
pub struct ReactAgentConfig {
    /// Chat model driving the agent
    model: Arc<dyn ChatModel>,

    /// Tools available to the agent
    tools: Vec<Arc<dyn Tool>>,

    /// Prompt prepended to the model input, never stored in the state
    system_prompt: Option<String>,

    /// Whether tool failures are reported to the model (default: true)
    handle_tool_errors: bool,
}

impl ReactAgentConfig {
    pub fn new(model: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            model,
            tools,
            system_prompt: None,
            handle_tool_errors: true,
        }
    }

    /// Set system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// See [`ToolNode::with_error_handling`]
    pub fn with_tool_error_handling(mut self, handle_errors: bool) -> Self {
        self.handle_tool_errors = handle_errors;
        self
    }

    /// Build the compiled agent graph
    pub fn build(self) -> Result<CompiledGraph> {
        let tool_node = ToolNode::from_tools(self.tools)?.with_error_handling(self.handle_tool_errors);

        let mut graph = StateGraph::with_messages();
        graph.add_node(AGENT_NODE, agent_node(self.model, self.system_prompt))?;
        graph.add_node(TOOLS_LABEL, tool_node.into())?;
        graph.set_entry_point(AGENT_NODE)?;
        graph.add_conditional_edges(
            AGENT_NODE,
            tools_condition,
            [(TOOLS_LABEL, TOOLS_LABEL), (END, END)],
        )?;
        graph.add_edge(TOOLS_LABEL, AGENT_NODE)?;

        Ok(graph.compile()?)
    }
}

/// Create a ReAct agent with the given model and tools
///
/// Returns a [`ReactAgentConfig`] for further configuration.
pub fn create_react_agent(model: Arc<dyn ChatModel>, tools: Vec<Arc<dyn Tool>>) -> ReactAgentConfig {
    ReactAgentConfig::new(model, tools)
}

/// Create the classic agent executor: `agent` and `action` nodes routed by
/// [`should_continue`].
pub fn create_agent_executor(
    model: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<CompiledGraph> {
    let tool_node = ToolNode::from_tools(tools)?;

    let mut graph = StateGraph::with_messages();
    graph.add_node(AGENT_NODE, agent_node(model, None))?;
    graph.add_node(ACTION_NODE, tool_node.into())?;
    graph.set_entry_point(AGENT_NODE)?;
    graph.add_conditional_edges(
        AGENT_NODE,
        should_continue,
        [("continue", ACTION_NODE), ("end", END)],
    )?;
    graph.add_edge(ACTION_NODE, AGENT_NODE)?;

    Ok(graph.compile()?)
}

fn agent_node(model: Arc<dyn ChatModel>, system_prompt: Option<String>) -> NodeAction {
    NodeAction::from_async(move |state: State, ctx: NodeContext| {
        let model = model.clone();
        let system_prompt = system_prompt.clone();
        async move {
            call_model(model.as_ref(), system_prompt.as_deref(), &state, &ctx)
                .await
                .map_err(BoxError::from)
        }
    })
}

async fn call_model(
    model: &dyn ChatModel,
    system_prompt: Option<&str>,
    state: &State,
    ctx: &NodeContext,
) -> Result<State> {
    let mut history = state.messages()?;
    if let Some(prompt) = system_prompt {
        let has_system = history
            .first()
            .is_some_and(|message| message.role == MessageRole::System);
        if !has_system {
            history.insert(0, Message::system(prompt));
        }
    }

    let writer = ctx.writer();
    let reply = if writer.is_streaming() {
        let chunks = model.stream(&history).await?;
        collect_chat_stream(chunks, writer).await?
    } else {
        model.invoke(&history).await?
    };

    tracing::debug!(
        model = model.name(),
        step = ctx.step(),
        tool_calls = reply.tool_calls.len(),
        "model replied"
    );
    Ok(State::from_messages(vec![reply])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stepgraph_core::llm::ScriptedChatModel;
    use stepgraph_core::{FnTool, GraphError, ModelError, ToolCall};

    fn echo() -> Arc<dyn Tool> {
        Arc::new(FnTool::new("echo", "Echo the input", |args| async move { Ok(args) }))
    }

    #[test]
    fn test_executor_structure() {
        let model = Arc::new(ScriptedChatModel::new([]));
        let structure = create_agent_executor(model, vec![echo()]).unwrap().structure();

        assert_eq!(structure.entry, "agent");
        assert_eq!(
            structure.nodes.iter().map(String::as_str).collect::<Vec<_>>(),
            ["action", "agent"]
        );
        assert_eq!(
            serde_json::to_value(&structure.edges).unwrap(),
            json!({
                "action": {"kind": "direct", "to": "agent"},
                "agent": {"kind": "conditional", "to": {"continue": "action", "end": "__end__"}}
            })
        );
    }

    #[test]
    fn test_duplicate_tools_rejected() {
        let model = Arc::new(ScriptedChatModel::new([]));
        assert!(create_agent_executor(model, vec![echo(), echo()]).is_err());
    }

    #[test]
    fn test_should_continue() {
        let calls = State::from_messages(vec![Message::ai_tool_calls(vec![ToolCall::new(
            "call_1",
            "echo",
            json!({}),
        )])])
        .unwrap();
        assert_eq!(should_continue(&calls).unwrap(), "continue");

        let done = State::from_messages(vec![Message::ai("bye")]).unwrap();
        assert_eq!(should_continue(&done).unwrap(), "end");
    }

    #[tokio::test]
    async fn test_system_prompt_reaches_model_only() {
        let model = Arc::new(ScriptedChatModel::new([Message::ai("Hi!")]));
        let agent = create_react_agent(model.clone(), vec![echo()])
            .with_system_prompt("Be brief.")
            .build()
            .unwrap();

        let input = State::from_messages(vec![Message::human("hello")]).unwrap();
        let output = agent.run(input).await.unwrap();

        let seen = &model.inputs()[0];
        assert_eq!(seen[0].role, MessageRole::System);
        assert_eq!(seen[0].text(), Some("Be brief."));

        let stored = output.messages().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|m| m.role != MessageRole::System));
    }

    #[tokio::test]
    async fn test_model_failure_fails_run() {
        let model = Arc::new(
            ScriptedChatModel::new([]).then_fail(ModelError::Transport("connection reset".into())),
        );
        let agent = create_agent_executor(model, vec![echo()]).unwrap();

        let input = State::from_messages(vec![Message::human("hello")]).unwrap();
        let err = agent.run(input).await.unwrap_err();
        match err {
            GraphError::NodeExecution { node, source } => {
                assert_eq!(node, "agent");
                assert!(source.to_string().contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
