//! Agent patterns built on [`StateGraph`](stepgraph_core::StateGraph)
//!
//! - [`create_agent_executor`] - `agent`/`action` loop routed by `continue`/`end`
//! - [`create_react_agent`] - `agent`/`tools` loop routed by [`tools_condition`](crate::tools_condition),
//!   with an optional system prompt

pub mod react;

pub use react::{
    create_agent_executor, create_react_agent, should_continue, ReactAgentConfig, ACTION_NODE,
    AGENT_NODE,
};
