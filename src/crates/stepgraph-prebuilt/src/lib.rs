//! # stepgraph-prebuilt - Tool-calling agents
//!
//! Ready-made pieces for the most common graph: a chat model that may
//! request tool calls, and a node that runs them.
//!
//! - **[`ToolExecutor`]** / **[`ToolInvocation`]** - run tools by name
//! - **[`ToolNode`]** - graph node executing the tool calls of the last `ai` message
//! - **[`tools_condition`]** - router sending tool-calling turns to the tools node
//! - **[`create_agent_executor`]** / **[`create_react_agent`]** - complete agent loops
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  stepgraph-prebuilt                             │
//! │  agents ──▶ ToolNode ──▶ ToolExecutor ──▶ Tool  │
//! │    │                                            │
//! │    └──▶ ChatModel (invoke / stream)             │
//! └──────────────┬──────────────────────────────────┘
//!                │ builds on
//!                ▼
//! ┌─────────────────────────────────────────────────┐
//! │  stepgraph-core                                 │
//! │  StateGraph, CompiledGraph, messages, events    │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod agents;
pub mod error;
pub mod tool_executor;
pub mod tool_node;

pub use agents::{create_agent_executor, create_react_agent, should_continue, ReactAgentConfig};
pub use error::{PrebuiltError, Result};
pub use tool_executor::{ToolExecutor, ToolInvocation};
pub use tool_node::{tools_condition, ToolNode, TOOLS_LABEL};
