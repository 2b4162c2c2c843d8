//! # stepgraph-core - Stateful graph execution for model-driven agents
//!
//! Build a directed graph of nodes over a shared JSON state, compile it, and
//! run it as a strictly sequential walk: each node receives a snapshot of the
//! state, returns a partial update, and the update is merged through
//! per-field reducers before the outgoing edge picks the next node.
//!
//! ## Core Concepts
//!
//! ### 1. StateGraph - Primary API
//!
//! [`StateGraph`] collects:
//! - **Nodes**: [`NodeAction::sync`] transforms or [`NodeAction::from_async`] tasks
//! - **Edges**: unconditional, or conditional with a router and a label map
//! - **Entry point**: where every run starts
//! - **State schema**: field kinds and reducers ([`StateSchema`])
//!
//! ### 2. Step scheduler
//!
//! ```text
//! Pending(entry) ─▶ Running(node) ─▶ Merged(node) ─▶ Pending(next) ─▶ ... ─▶ Terminated
//!                        └──────────────┴── any failure ─▶ Failed
//! ```
//!
//! Exactly one node runs at a time. Routers see the post-merge state.
//!
//! ### 3. Three ways to drive a run
//!
//! - [`CompiledGraph::run`] returns the final state
//! - [`CompiledGraph::run_streaming`] yields a [`StateSnapshot`] per node visited
//! - [`CompiledGraph::run_with_events`] yields [`StreamEvent`]s, including
//!   model tokens and tool calls emitted by nodes through their [`StreamWriter`]
//!
//! ## Quick Start
//!
//! ```rust
//! use stepgraph_core::{Message, NodeAction, State, StateGraph, END};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = StateGraph::with_messages();
//! graph.add_node(
//!     "bot",
//!     NodeAction::sync(|state: &State| {
//!         let question = state.last_message()?.and_then(|m| m.text().map(str::to_string));
//!         let reply = Message::ai(format!("you said: {}", question.unwrap_or_default()));
//!         Ok(State::from_messages(vec![reply])?)
//!     }),
//! )?;
//! graph.set_entry_point("bot")?.add_edge("bot", END)?;
//!
//! let input = State::from_messages(vec![Message::human("hello")])?;
//! let output = graph.compile()?.run(input).await?;
//! assert_eq!(output.messages()?.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`builder`] / [`graph`] - graph definition and validation
//! - [`state`] / [`messages`] - state values, reducers, conversation messages
//! - [`compiled`] / [`stream`] / [`runtime`] - execution and observation
//! - [`llm`] / [`tool`] - collaborator contracts for model and tool calls
//! - [`config`] - per-run configuration

pub mod builder;
pub mod compiled;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod messages;
pub mod runtime;
mod scheduler;
pub mod state;
pub mod stream;
pub mod tool;

pub use builder::StateGraph;
pub use compiled::{CompiledGraph, EventStream, SnapshotStream};
pub use config::RunConfig;
pub use error::{BoxError, GraphError, Result};
pub use graph::{EdgeShape, GraphStructure, NodeAction, NodeId, NodeOutput, END, START};
pub use llm::{ChatChunk, ChatModel, ChatStream, ModelError};
pub use messages::{add_messages, Message, MessageRole, ToolCall};
pub use runtime::{NodeContext, StreamWriter};
pub use state::{
    AppendReducer, FieldKind, FnReducer, MergeReducer, OverwriteReducer, Patch, Reducer, State,
    StateError, StateSchema, SumReducer, MESSAGES_FIELD,
};
pub use stream::{StateSnapshot, StreamEvent};
pub use tool::{FnTool, Tool, ToolError};
