//! Core graph data structures: node capabilities, edges and the graph definition
//!
//! A [`Graph`] is the raw, mutable definition assembled by the
//! [`StateGraph`](crate::StateGraph) builder. Compilation validates it and
//! freezes it into a [`CompiledGraph`](crate::CompiledGraph).
//!
//! ```text
//!            ┌──────────┐  Direct   ┌──────────┐
//!  entry ──▶ │  agent   │ ────────▶ │  ...     │
//!            └──────────┘           └──────────┘
//!                 │ Conditional { router, path_map }
//!                 ├── "continue" ──▶ action
//!                 └── "end"      ──▶ __end__
//! ```

use crate::error::{BoxError, GraphError, Result};
use crate::runtime::NodeContext;
use crate::state::State;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Node identifier - unique name for each node in the graph
pub type NodeId = String;

/// Reserved identifier of the virtual entry node
///
/// `add_edge(START, node)` is equivalent to `set_entry_point(node)`.
pub const START: &str = "__start__";

/// Reserved identifier of the terminal marker
///
/// Routing to `END` terminates the run with the current state as result.
pub const END: &str = "__end__";

/// Output of a node capability: a partial state update
pub type NodeOutput = std::result::Result<State, BoxError>;

/// Synchronous node capability
pub type SyncNodeFn = Arc<dyn Fn(&State) -> NodeOutput + Send + Sync>;

/// Asynchronous node capability
pub type AsyncNodeFn = Arc<dyn Fn(State, NodeContext) -> BoxFuture<'static, NodeOutput> + Send + Sync>;

/// Router function of a conditional edge: state -> label
pub type RouterFn = Arc<dyn Fn(&State) -> std::result::Result<String, BoxError> + Send + Sync>;

/// Node capability, selected once at graph-construction time
///
/// The scheduler dispatches on the variant: synchronous transforms run inline,
/// asynchronous transforms run on their own task and may await external
/// collaborators (model or tool calls).
///
/// ```rust
/// use stepgraph_core::{NodeAction, State};
/// use serde_json::json;
///
/// let shout = NodeAction::sync(|state: &State| {
///     let text = state.get("text").and_then(|v| v.as_str()).unwrap_or_default();
///     Ok(State::new().with("text", text.to_uppercase()))
/// });
///
/// let fetch = NodeAction::from_async(|_state, ctx| async move {
///     Ok(State::new().with("visited_by", json!(ctx.node())))
/// });
///
/// assert!(!shout.is_async());
/// assert!(fetch.is_async());
/// ```
#[derive(Clone)]
pub enum NodeAction {
    /// Pure state transform, executed inline by the scheduler
    Sync(SyncNodeFn),

    /// Suspendable transform receiving an owned snapshot and a [`NodeContext`]
    Async(AsyncNodeFn),
}

impl NodeAction {
    /// Wrap a synchronous transform
    pub fn sync<F>(func: F) -> Self
    where
        F: Fn(&State) -> NodeOutput + Send + Sync + 'static,
    {
        NodeAction::Sync(Arc::new(func))
    }

    /// Wrap an asynchronous transform
    pub fn from_async<F, Fut>(func: F) -> Self
    where
        F: Fn(State, NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeOutput> + Send + 'static,
    {
        NodeAction::Async(Arc::new(move |state, ctx| Box::pin(func(state, ctx))))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, NodeAction::Async(_))
    }
}

impl fmt::Debug for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAction::Sync(_) => f.write_str("NodeAction::Sync(<function>)"),
            NodeAction::Async(_) => f.write_str("NodeAction::Async(<function>)"),
        }
    }
}

/// Edge type defining the transition out of a node
#[derive(Clone)]
pub enum Edge {
    /// Unconditional edge to a node or [`END`]
    Direct(NodeId),

    /// Conditional edge: the router picks a label, the path map resolves it
    Conditional {
        /// Router function evaluated against the post-merge state
        router: RouterFn,

        /// Label to destination mapping (destinations may be [`END`])
        path_map: BTreeMap<String, NodeId>,
    },
}

impl Edge {
    /// All possible destinations of this edge
    pub fn destinations(&self) -> Vec<&NodeId> {
        match self {
            Edge::Direct(to) => vec![to],
            Edge::Conditional { path_map, .. } => path_map.values().collect(),
        }
    }

    fn shape(&self) -> EdgeShape {
        match self {
            Edge::Direct(to) => EdgeShape::Direct(to.clone()),
            Edge::Conditional { path_map, .. } => EdgeShape::Conditional(path_map.clone()),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { path_map, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("path_map", path_map)
                .finish(),
        }
    }
}

/// Router-free description of an edge, used for introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "to", rename_all = "snake_case")]
pub enum EdgeShape {
    Direct(NodeId),
    Conditional(BTreeMap<String, NodeId>),
}

/// Static structure of a compiled graph
///
/// Two compilations of the same definition produce equal structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStructure {
    /// Entry node
    pub entry: NodeId,
    /// Registered nodes, sorted
    pub nodes: BTreeSet<NodeId>,
    /// Outgoing edge of every node
    pub edges: BTreeMap<NodeId, EdgeShape>,
    /// Terminal marker
    pub terminal: String,
}

/// Raw graph definition: nodes, outgoing edges and the entry point
///
/// Typically you won't touch `Graph` directly; use
/// [`StateGraph`](crate::StateGraph), which checks ids as they are added.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node capabilities by id
    pub(crate) nodes: BTreeMap<NodeId, NodeAction>,

    /// Outgoing edge definitions by source node
    ///
    /// More than one definition per node is rejected at compile time.
    pub(crate) edges: BTreeMap<NodeId, Vec<Edge>>,

    /// Entry node, if set
    pub(crate) entry: Option<NodeId>,
}

/// Validated graph, ready to be frozen
#[derive(Debug)]
pub(crate) struct ValidatedGraph {
    pub(crate) entry: NodeId,
    pub(crate) nodes: BTreeMap<NodeId, NodeAction>,
    pub(crate) edges: BTreeMap<NodeId, Edge>,
    pub(crate) unreachable: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Registered node ids, sorted
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    fn check_target(&self, to: &str) -> Result<()> {
        if to == END || self.nodes.contains_key(to) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(to.to_string()))
        }
    }

    /// Validate the definition and produce its frozen form.
    ///
    /// Checks run in a fixed order over sorted ids, so the same definition
    /// always fails with the same error.
    pub(crate) fn validate(&self) -> Result<ValidatedGraph> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| GraphError::integrity("entry point is not set"))?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownNode(entry));
        }

        for id in self.nodes.keys() {
            if id == END || id == START {
                return Err(GraphError::integrity(format!("node id '{id}' is reserved")));
            }
        }

        let mut edges = BTreeMap::new();
        for (from, definitions) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownNode(from.clone()));
            }
            let edge = match definitions.as_slice() {
                [edge] => edge,
                [] => continue,
                _ => {
                    return Err(GraphError::integrity(format!(
                        "node '{from}' has {} outgoing edge definitions, expected one",
                        definitions.len()
                    )))
                }
            };
            if let Edge::Conditional { path_map, .. } = edge {
                if path_map.is_empty() {
                    return Err(GraphError::integrity(format!(
                        "conditional edge of node '{from}' declares no labels"
                    )));
                }
            }
            for to in edge.destinations() {
                self.check_target(to)?;
            }
            edges.insert(from.clone(), edge.clone());
        }

        let reachable = reachable_from(&entry, &edges);
        for id in &reachable {
            if id != END && !edges.contains_key(id) {
                return Err(GraphError::integrity(format!(
                    "node '{id}' has no outgoing edge"
                )));
            }
        }
        if !reachable.contains(END) {
            return Err(GraphError::integrity(format!(
                "'{END}' is not reachable from entry node '{entry}'"
            )));
        }

        let unreachable: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect();

        Ok(ValidatedGraph {
            entry,
            nodes: self.nodes.clone(),
            edges,
            unreachable,
        })
    }
}

/// Breadth-first walk over edge destinations, including [`END`] when reached
fn reachable_from(entry: &str, edges: &BTreeMap<NodeId, Edge>) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([entry.to_string()]);

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(edge) = edges.get(&id) {
            queue.extend(edge.destinations().into_iter().cloned());
        }
    }

    seen
}

impl ValidatedGraph {
    pub(crate) fn structure(&self) -> GraphStructure {
        GraphStructure {
            entry: self.entry.clone(),
            nodes: self.nodes.keys().cloned().collect(),
            edges: self
                .edges
                .iter()
                .map(|(from, edge)| (from.clone(), edge.shape()))
                .collect(),
            terminal: END.to_string(),
        }
    }
}
