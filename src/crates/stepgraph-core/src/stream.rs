//! Typed observation items produced while a run executes
//!
//! Two lazily-driven views exist over the same scheduler loop:
//!
//! | View | Item | Entry point |
//! |------|------|-------------|
//! | Step streaming | [`StateSnapshot`] after every merge | [`CompiledGraph::run_streaming`](crate::CompiledGraph::run_streaming) |
//! | Event streaming | [`StreamEvent`] | [`CompiledGraph::run_with_events`](crate::CompiledGraph::run_with_events) |
//!
//! # Event ordering
//!
//! ```text
//! node_start(agent)
//!   model_token(agent, "...")*        emitted while the model call is in flight
//! node_end(agent)
//! node_start(action)
//!   (tool_start(action, t) tool_end(action, t))*
//! node_end(action)
//! ...
//! run_end(final_state) | run_failed(error)
//! ```
//!
//! Events of a node never appear outside its `node_start`/`node_end` pair,
//! and node pairs follow the scheduler's step order.

use crate::graph::NodeId;
use crate::state::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event published on the event stream of a run
///
/// Serialized as `{"event": "<kind>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The scheduler is about to invoke a node
    NodeStart {
        /// Node being executed
        node: NodeId,
    },

    /// The node's patch was merged into the state
    NodeEnd {
        /// Node that finished
        node: NodeId,
    },

    /// Incremental text produced by a streaming model call
    ModelToken {
        /// Node performing the model call
        node: NodeId,
        /// Text fragment
        text: String,
    },

    /// A tool is about to be invoked
    ToolStart {
        /// Node invoking the tool
        node: NodeId,
        /// Tool name
        tool: String,
        /// Arguments passed to the tool
        arguments: Value,
    },

    /// A tool returned (or failed and was converted into an error message)
    ToolEnd {
        /// Node invoking the tool
        node: NodeId,
        /// Tool name
        tool: String,
        /// Tool output
        output: Value,
    },

    /// The run reached the terminal marker
    RunEnd {
        /// Final state of the run
        final_state: State,
    },

    /// The run failed; no further events follow
    RunFailed {
        /// Rendered error
        error: String,
    },
}

impl StreamEvent {
    /// Node the event belongs to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            StreamEvent::NodeStart { node }
            | StreamEvent::NodeEnd { node }
            | StreamEvent::ModelToken { node, .. }
            | StreamEvent::ToolStart { node, .. }
            | StreamEvent::ToolEnd { node, .. } => Some(node),
            StreamEvent::RunEnd { .. } | StreamEvent::RunFailed { .. } => None,
        }
    }

    /// Event kind as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::NodeStart { .. } => "node_start",
            StreamEvent::NodeEnd { .. } => "node_end",
            StreamEvent::ModelToken { .. } => "model_token",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolEnd { .. } => "tool_end",
            StreamEvent::RunEnd { .. } => "run_end",
            StreamEvent::RunFailed { .. } => "run_failed",
        }
    }

    /// Whether this event closes the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::RunEnd { .. } | StreamEvent::RunFailed { .. })
    }
}

/// State after a node's patch was merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Zero-based index of the step within the run
    pub step: usize,

    /// Node whose patch produced this state
    pub node: NodeId,

    /// Full post-merge state
    pub values: State,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = StreamEvent::ToolStart {
            node: "action".to_string(),
            tool: "search".to_string(),
            arguments: json!({"query": "weather in sf"}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "tool_start");
        assert_eq!(value["data"]["arguments"]["query"], "weather in sf");
        assert_eq!(event.kind(), "tool_start");

        let back: StreamEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_node_and_terminal() {
        let start = StreamEvent::NodeStart { node: "agent".into() };
        assert_eq!(start.node(), Some("agent"));
        assert!(!start.is_terminal());

        let failed = StreamEvent::RunFailed { error: "boom".into() };
        assert_eq!(failed.node(), None);
        assert!(failed.is_terminal());
    }
}
