//! Executable form of a graph
//!
//! Once a [`StateGraph`](crate::StateGraph) is compiled it becomes a
//! [`CompiledGraph`]: immutable, cheap to clone, and runnable any number of
//! times. Every run owns its own state; nothing is shared between runs.
//!
//! # Driving modes
//!
//! | Method | Yields |
//! |--------|--------|
//! | [`run`](CompiledGraph::run) | final state |
//! | [`run_streaming`](CompiledGraph::run_streaming) | one [`StateSnapshot`](crate::StateSnapshot) per node visited |
//! | [`run_with_events`](CompiledGraph::run_with_events) | ordered [`StreamEvent`](crate::StreamEvent)s |
//!
//! All three drive the same scheduler, so the sequence of visited nodes is
//! identical whichever mode observes it.

mod execution;
mod graph;
mod introspection;
mod streaming;
mod types;

pub use graph::CompiledGraph;
pub(crate) use graph::GraphCore;
pub use types::{EventStream, SnapshotStream};
