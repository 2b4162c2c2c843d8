//! Streaming entry points
//!
//! Both streams are lazy: nothing runs until they are polled, and a node is
//! only started when the consumer asks for the next item. Dropping a stream
//! abandons the run; an asynchronous node already in flight settles on its
//! own task, but no further node is started.

use super::{CompiledGraph, EventStream, SnapshotStream};
use crate::config::RunConfig;
use crate::scheduler::{drive, RunItem};
use crate::state::State;
use futures::{future, StreamExt};

impl CompiledGraph {
    /// Stream the state after every merge, one snapshot per node visited.
    pub fn run_streaming(&self, input: State) -> SnapshotStream {
        self.run_streaming_with_config(input, RunConfig::default())
    }

    /// [`run_streaming`](Self::run_streaming) with an explicit configuration.
    pub fn run_streaming_with_config(&self, input: State, config: RunConfig) -> SnapshotStream {
        tracing::debug!(run_name = ?config.run_name, "step streaming run requested");
        drive(self.core(), input, config, false)
            .filter_map(|item| {
                future::ready(match item {
                    RunItem::Snapshot(snapshot) => Some(Ok(snapshot)),
                    RunItem::Done(Err(error)) => Some(Err(error)),
                    RunItem::Done(Ok(_)) | RunItem::Event(_) => None,
                })
            })
            .boxed()
    }

    /// Stream typed events: node boundaries, model tokens, tool calls, and
    /// finally `run_end` or `run_failed`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures::StreamExt;
    /// use stepgraph_core::{NodeAction, State, StateGraph, StreamEvent, END};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut graph = StateGraph::new();
    /// graph.add_node("only", NodeAction::sync(|_| Ok(State::new())))?;
    /// graph.set_entry_point("only")?.set_finish_point("only")?;
    ///
    /// let kinds: Vec<&str> = graph
    ///     .compile()?
    ///     .run_with_events(State::new())
    ///     .map(|event| event.kind())
    ///     .collect()
    ///     .await;
    /// assert_eq!(kinds, ["node_start", "node_end", "run_end"]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn run_with_events(&self, input: State) -> EventStream {
        self.run_with_events_with_config(input, RunConfig::default())
    }

    /// [`run_with_events`](Self::run_with_events) with an explicit configuration.
    pub fn run_with_events_with_config(&self, input: State, config: RunConfig) -> EventStream {
        tracing::debug!(run_name = ?config.run_name, "event streaming run requested");
        drive(self.core(), input, config, true)
            .filter_map(|item| {
                future::ready(match item {
                    RunItem::Event(event) => Some(event),
                    RunItem::Snapshot(_) | RunItem::Done(_) => None,
                })
            })
            .boxed()
    }
}
