//! StateGraph builder API for constructing stateful graph workflows
//!
//! [`StateGraph`] collects nodes, edges and the entry point, checks ids as
//! they are added, and [`compile`](StateGraph::compile)s the definition into
//! an immutable [`CompiledGraph`].
//!
//! ```text
//!  StateGraph (builder)                      CompiledGraph
//!  ┌────────────────────────────┐  compile   ┌─────────────────────────┐
//!  │ add_node / add_edge        │ ─────────▶ │ validated, frozen        │
//!  │ add_conditional_edges      │            │ run / run_streaming /    │
//!  │ set_entry_point            │            │ run_with_events          │
//!  └────────────────────────────┘            └─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use stepgraph_core::{NodeAction, State, StateGraph, END};
//! use stepgraph_core::state::{FieldKind, StateSchema, SumReducer};
//!
//! # fn main() -> Result<(), stepgraph_core::GraphError> {
//! let schema = StateSchema::new().with_field("attempts", FieldKind::Number, SumReducer);
//! let mut graph = StateGraph::with_schema(schema);
//!
//! graph.add_node("try", NodeAction::sync(|_| Ok(State::new().with("attempts", 1))))?;
//! graph.add_conditional_edges(
//!     "try",
//!     |state: &State| {
//!         let attempts = state.get("attempts").and_then(|v| v.as_i64()).unwrap_or(0);
//!         Ok(if attempts < 3 { "retry" } else { "give_up" }.to_string())
//!     },
//!     [("retry", "try"), ("give_up", END)],
//! )?;
//! graph.set_entry_point("try")?;
//!
//! let compiled = graph.compile()?;
//! assert_eq!(compiled.entry(), "try");
//! # Ok(())
//! # }
//! ```

use crate::compiled::CompiledGraph;
use crate::error::{BoxError, GraphError, Result};
use crate::graph::{Edge, Graph, NodeAction, NodeId, END, START};
use crate::state::{State, StateSchema};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builder for stateful graphs
#[derive(Debug, Clone, Default)]
pub struct StateGraph {
    graph: Graph,
    schema: StateSchema,
}

impl StateGraph {
    /// Create a builder with an empty, non-strict schema
    ///
    /// Every field uses the overwrite reducer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder whose patches are merged by `schema`
    pub fn with_schema(schema: StateSchema) -> Self {
        Self {
            graph: Graph::new(),
            schema,
        }
    }

    /// Create a builder for message-based graphs
    ///
    /// The state carries a `messages` field merged with
    /// [`add_messages`](crate::messages::add_messages).
    pub fn with_messages() -> Self {
        Self::with_schema(StateSchema::messages())
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn require_node(&self, id: &str) -> Result<()> {
        if self.graph.contains_node(id) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id.to_string()))
        }
    }

    fn require_target(&self, id: &str) -> Result<()> {
        if id == END {
            Ok(())
        } else {
            self.require_node(id)
        }
    }

    /// Register a node.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateNode`] if `id` is taken, [`GraphError::GraphIntegrity`]
    /// if `id` is one of the reserved markers.
    pub fn add_node(&mut self, id: impl Into<NodeId>, action: NodeAction) -> Result<&mut Self> {
        let id = id.into();
        if id == END || id == START {
            return Err(GraphError::integrity(format!("node id '{id}' is reserved")));
        }
        if self.graph.contains_node(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        tracing::trace!(node = %id, asynchronous = action.is_async(), "node added");
        self.graph.nodes.insert(id, action);
        Ok(self)
    }

    /// Add an unconditional edge.
    ///
    /// `to` may be [`END`]. `add_edge(START, node)` sets the entry point.
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Result<&mut Self> {
        let (from, to) = (from.into(), to.into());
        if from == START {
            return self.set_entry_point(to);
        }
        self.require_node(&from)?;
        self.require_target(&to)?;

        self.graph.edges.entry(from).or_default().push(Edge::Direct(to));
        Ok(self)
    }

    /// Add a conditional edge.
    ///
    /// After `from` runs, `router` is called with the merged state and the
    /// returned label is looked up in `path_map`. An unmapped label fails
    /// the run with [`GraphError::Routing`].
    pub fn add_conditional_edges<F, I, L, T>(
        &mut self,
        from: impl Into<NodeId>,
        router: F,
        path_map: I,
    ) -> Result<&mut Self>
    where
        F: Fn(&State) -> std::result::Result<String, BoxError> + Send + Sync + 'static,
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<NodeId>,
    {
        let from = from.into();
        self.require_node(&from)?;

        let path_map: BTreeMap<String, NodeId> = path_map
            .into_iter()
            .map(|(label, to)| (label.into(), to.into()))
            .collect();
        for to in path_map.values() {
            self.require_target(to)?;
        }

        self.graph.edges.entry(from).or_default().push(Edge::Conditional {
            router: Arc::new(router),
            path_map,
        });
        Ok(self)
    }

    /// Set the node the scheduler starts with
    pub fn set_entry_point(&mut self, id: impl Into<NodeId>) -> Result<&mut Self> {
        let id = id.into();
        self.require_node(&id)?;
        self.graph.entry = Some(id);
        Ok(self)
    }

    /// Route `id` to [`END`] unconditionally
    pub fn set_finish_point(&mut self, id: impl Into<NodeId>) -> Result<&mut Self> {
        self.add_edge(id, END)
    }

    /// Validate the definition and freeze it.
    ///
    /// Fails with [`GraphError::GraphIntegrity`] when the entry point is not
    /// set, a conditional edge declares no labels, a reachable node has no
    /// outgoing edge or more than one, [`END`] is unreachable, or the schema
    /// pairs a reducer with a field kind it cannot handle. Nodes that cannot
    /// be reached from the entry only produce a warning.
    ///
    /// The builder is left untouched, so compiling twice yields two graphs
    /// with the same [`structure`](CompiledGraph::structure).
    pub fn compile(&self) -> Result<CompiledGraph> {
        self.schema
            .validate()
            .map_err(|e| GraphError::integrity(format!("state schema: {e}")))?;
        let validated = self.graph.validate()?;

        for node in &validated.unreachable {
            tracing::warn!(node = %node, entry = %validated.entry, "node is unreachable from the entry point");
        }
        tracing::debug!(
            entry = %validated.entry,
            nodes = validated.nodes.len(),
            "graph compiled"
        );

        Ok(CompiledGraph::new(validated, self.schema.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FieldKind, SumReducer};

    fn noop() -> NodeAction {
        NodeAction::sync(|_| Ok(State::new()))
    }

    fn label(value: &'static str) -> impl Fn(&State) -> std::result::Result<String, BoxError> {
        move |_| Ok(value.to_string())
    }

    #[test]
    fn test_duplicate_node() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop()).unwrap();
        assert!(matches!(
            graph.add_node("a", noop()),
            Err(GraphError::DuplicateNode(ref id)) if id == "a"
        ));
    }

    #[test]
    fn test_reserved_node_ids() {
        let mut graph = StateGraph::new();
        assert!(matches!(graph.add_node(END, noop()), Err(GraphError::GraphIntegrity(_))));
        assert!(matches!(graph.add_node(START, noop()), Err(GraphError::GraphIntegrity(_))));
    }

    #[test]
    fn test_edges_require_registered_nodes() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop()).unwrap();

        assert!(matches!(graph.add_edge("a", "b"), Err(GraphError::UnknownNode(ref id)) if id == "b"));
        assert!(matches!(graph.add_edge("b", "a"), Err(GraphError::UnknownNode(_))));
        assert!(matches!(
            graph.add_conditional_edges("a", label("x"), [("x", "ghost")]),
            Err(GraphError::UnknownNode(ref id)) if id == "ghost"
        ));
        assert!(graph.add_edge("a", END).is_ok());
    }

    #[test]
    fn test_entry_point_requires_registered_node() {
        let mut graph = StateGraph::new();
        assert!(matches!(graph.set_entry_point("a"), Err(GraphError::UnknownNode(_))));
    }

    #[test]
    fn test_add_edge_from_start_sets_entry() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop()).unwrap();
        graph.add_edge(START, "a").unwrap().add_edge("a", END).unwrap();
        assert_eq!(graph.graph().entry(), Some("a"));
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_compile_without_entry() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop()).unwrap().set_finish_point("a").unwrap();
        assert!(matches!(graph.compile(), Err(GraphError::GraphIntegrity(_))));
    }

    #[test]
    fn test_compile_rejects_empty_label_set() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop()).unwrap();
        graph
            .add_conditional_edges("a", label("x"), Vec::<(String, String)>::new())
            .unwrap();
        graph.set_entry_point("a").unwrap();

        let err = graph.compile().unwrap_err();
        assert!(err.to_string().contains("declares no labels"));
    }

    #[test]
    fn test_compile_rejects_incompatible_schema() {
        let schema = StateSchema::new().with_field("total", FieldKind::Bool, SumReducer);
        let mut graph = StateGraph::with_schema(schema);
        graph.add_node("a", noop()).unwrap();
        graph.set_entry_point("a").unwrap().set_finish_point("a").unwrap();

        assert!(matches!(graph.compile(), Err(GraphError::GraphIntegrity(_))));
    }

    #[test]
    fn test_unreachable_node_only_warns() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop()).unwrap();
        graph.add_node("island", noop()).unwrap();
        graph.set_entry_point("a").unwrap();
        graph.set_finish_point("a").unwrap();
        graph.set_finish_point("island").unwrap();

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.unreachable_nodes(), ["island".to_string()]);
    }

    #[test]
    fn test_compile_is_repeatable() {
        let mut graph = StateGraph::with_messages();
        graph.add_node("agent", noop()).unwrap();
        graph.add_node("action", noop()).unwrap();
        graph
            .add_conditional_edges("agent", label("end"), [("continue", "action"), ("end", END)])
            .unwrap();
        graph.add_edge("action", "agent").unwrap();
        graph.set_entry_point("agent").unwrap();

        let first = graph.compile().unwrap().structure();
        let second = graph.compile().unwrap().structure();
        assert_eq!(first, second);
        assert_eq!(first.nodes.len(), 2);
        assert_eq!(first.terminal, END);
    }
}
