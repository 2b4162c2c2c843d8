//! Graph introspection

use super::CompiledGraph;
use crate::graph::{GraphStructure, NodeId};
use crate::state::StateSchema;

impl CompiledGraph {
    /// Static structure: nodes, edges with their label maps, entry, terminal.
    pub fn structure(&self) -> GraphStructure {
        self.core.graph.structure()
    }

    /// Entry node of the graph
    pub fn entry(&self) -> &str {
        &self.core.graph.entry
    }

    /// Registered node ids, sorted
    pub fn node_ids(&self) -> Vec<&str> {
        self.core.graph.nodes.keys().map(String::as_str).collect()
    }

    /// Nodes that cannot be reached from the entry point.
    ///
    /// Such nodes do not prevent compilation; they are reported here and
    /// logged as a warning.
    pub fn unreachable_nodes(&self) -> &[NodeId] {
        &self.core.graph.unreachable
    }

    /// State schema the graph merges patches with
    pub fn schema(&self) -> &StateSchema {
        &self.core.schema
    }
}
