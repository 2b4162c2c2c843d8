//! CompiledGraph struct and constructor

use crate::graph::ValidatedGraph;
use crate::state::StateSchema;
use std::fmt;
use std::sync::Arc;

/// Frozen graph shared by every run of a [`CompiledGraph`]
pub(crate) struct GraphCore {
    pub(crate) graph: ValidatedGraph,
    pub(crate) schema: StateSchema,
}

/// Compiled graph ready for execution
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) core: Arc<GraphCore>,
}

impl CompiledGraph {
    pub(crate) fn new(graph: ValidatedGraph, schema: StateSchema) -> Self {
        Self {
            core: Arc::new(GraphCore { graph, schema }),
        }
    }

    pub(crate) fn core(&self) -> Arc<GraphCore> {
        Arc::clone(&self.core)
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.core.graph.entry)
            .field("nodes", &self.core.graph.nodes.keys().collect::<Vec<_>>())
            .field("schema", &self.core.schema)
            .finish()
    }
}
