//! Error types for graph construction and execution
//!
//! Every fallible operation in this crate returns [`GraphError`]. The variants
//! split into two families:
//!
//! ```text
//! GraphError
//! ├── compile time (raised by the StateGraph builder)
//! │   ├── DuplicateNode    - add_node with an id that is already taken
//! │   ├── UnknownNode      - an edge or the entry point names an unregistered node
//! │   └── GraphIntegrity   - structural problem found by compile()
//! └── run time (abort the in-flight run, no retries)
//!     ├── Routing          - a router returned a label missing from its path map
//!     ├── RouterFailed     - a router returned an error
//!     ├── NodeExecution    - a node capability failed (wraps the collaborator error)
//!     ├── Reducer          - merging a node's patch into the state failed
//!     ├── RecursionLimit   - the run executed more nodes than RunConfig allows
//!     └── InvalidInput     - the caller's input state was rejected by the schema
//! ```
//!
//! Compile-time errors never yield a partially compiled graph. Run-time errors
//! are surfaced exactly once: as the `Err` of [`CompiledGraph::run`], as the last
//! item of [`CompiledGraph::run_streaming`], or as a `run_failed` event of
//! [`CompiledGraph::run_with_events`]. Retrying is left to the caller.
//!
//! [`CompiledGraph::run`]: crate::CompiledGraph::run
//! [`CompiledGraph::run_streaming`]: crate::CompiledGraph::run_streaming
//! [`CompiledGraph::run_with_events`]: crate::CompiledGraph::run_with_events

use crate::graph::NodeId;
use crate::state::StateError;
use thiserror::Error;

/// Boxed error returned by node capabilities and routers.
///
/// Anything implementing `std::error::Error + Send + Sync` converts into it
/// with `?`, so nodes can propagate collaborator errors unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error type for all graph operations
///
/// # Examples
///
/// ```rust
/// use stepgraph_core::{GraphError, NodeAction, StateGraph};
///
/// let mut graph = StateGraph::new();
/// graph.add_node("a", NodeAction::sync(|_| Ok(Default::default()))).unwrap();
///
/// let err = graph.add_node("a", NodeAction::sync(|_| Ok(Default::default()))).unwrap_err();
/// assert!(matches!(err, GraphError::DuplicateNode(ref id) if id == "a"));
/// ```
#[derive(Error, Debug)]
pub enum GraphError {
    /// A node with this id is already registered.
    #[error("node '{0}' is already registered")]
    DuplicateNode(NodeId),

    /// An edge, path map or entry point references a node that is not registered.
    #[error("node '{0}' is not registered")]
    UnknownNode(NodeId),

    /// The graph definition cannot be compiled.
    ///
    /// Raised for a missing entry point, an empty conditional path map, an
    /// unreachable terminal marker, dead-end nodes, nodes with more than one
    /// outgoing edge definition, reserved node ids, or a state schema whose
    /// reducers do not fit their declared field kinds.
    #[error("graph integrity check failed: {0}")]
    GraphIntegrity(String),

    /// A router returned a label that has no entry in its destination map.
    #[error("router of node '{node}' returned unmapped label '{label}'")]
    Routing {
        /// Source node of the conditional edge
        node: NodeId,
        /// Label returned by the router
        label: String,
    },

    /// A router function returned an error.
    #[error("router of node '{node}' failed: {source}")]
    RouterFailed {
        /// Source node of the conditional edge
        node: NodeId,
        /// Error returned by the router
        #[source]
        source: BoxError,
    },

    /// A node capability returned an error or panicked.
    #[error("node '{node}' execution failed: {source}")]
    NodeExecution {
        /// Node that failed
        node: NodeId,
        /// Underlying collaborator failure
        #[source]
        source: BoxError,
    },

    /// A reducer rejected the patch returned by a node.
    #[error("merging the patch of node '{node}' failed: {source}")]
    Reducer {
        /// Node whose patch could not be merged
        node: NodeId,
        /// Reducer or schema error
        #[source]
        source: StateError,
    },

    /// The run executed `limit` nodes without reaching the terminal marker.
    #[error("recursion limit of {limit} steps reached before the run terminated")]
    RecursionLimit {
        /// Configured limit
        limit: usize,
    },

    /// The input state does not satisfy the state schema.
    #[error("invalid input state: {0}")]
    InvalidInput(#[from] StateError),
}

impl GraphError {
    /// Create a node execution error with context
    ///
    /// ```rust
    /// use stepgraph_core::GraphError;
    ///
    /// let err = GraphError::node_execution("agent", "connection reset");
    /// assert_eq!(err.to_string(), "node 'agent' execution failed: connection reset");
    /// ```
    pub fn node_execution(node: impl Into<NodeId>, source: impl Into<BoxError>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            source: source.into(),
        }
    }

    /// Create a graph integrity error
    pub fn integrity(reason: impl Into<String>) -> Self {
        Self::GraphIntegrity(reason.into())
    }

    /// Node the error is attributed to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            GraphError::Routing { node, .. }
            | GraphError::RouterFailed { node, .. }
            | GraphError::NodeExecution { node, .. }
            | GraphError::Reducer { node, .. } => Some(node),
            GraphError::DuplicateNode(node) | GraphError::UnknownNode(node) => Some(node),
            _ => None,
        }
    }

    /// Whether the error was raised while building or compiling a graph.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateNode(_) | GraphError::UnknownNode(_) | GraphError::GraphIntegrity(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_node_execution_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = GraphError::node_execution("agent", io);

        assert_eq!(err.node(), Some("agent"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_routing_display() {
        let err = GraphError::Routing {
            node: "agent".to_string(),
            label: "maybe".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "router of node 'agent' returned unmapped label 'maybe'"
        );
        assert!(!err.is_compile_time());
    }

    #[test]
    fn test_compile_time_classification() {
        assert!(GraphError::DuplicateNode("a".into()).is_compile_time());
        assert!(GraphError::UnknownNode("a".into()).is_compile_time());
        assert!(GraphError::integrity("no entry").is_compile_time());
        assert!(!GraphError::RecursionLimit { limit: 3 }.is_compile_time());
    }

    #[test]
    fn test_recursion_limit_mentions_limit() {
        let err = GraphError::RecursionLimit { limit: 25 };
        assert!(err.to_string().contains("25"));
        assert_eq!(err.node(), None);
    }
}
