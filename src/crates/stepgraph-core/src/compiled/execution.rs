//! Run-to-completion entry points

use super::CompiledGraph;
use crate::config::RunConfig;
use crate::error::{GraphError, Result};
use crate::scheduler::{drive, RunItem};
use crate::state::State;
use futures::StreamExt;

impl CompiledGraph {
    /// Run the graph to completion with the default [`RunConfig`].
    ///
    /// Returns the state at the moment the terminal marker was reached.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stepgraph_core::{NodeAction, State, StateGraph, END};
    /// use serde_json::json;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut graph = StateGraph::new();
    /// graph.add_node("greet", NodeAction::sync(|_| Ok(State::new().with("greeting", "hello"))))?;
    /// graph.set_entry_point("greet")?.add_edge("greet", END)?;
    ///
    /// let compiled = graph.compile()?;
    /// let final_state = compiled.run(State::new()).await?;
    /// assert_eq!(final_state.get("greeting"), Some(&json!("hello")));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, input: State) -> Result<State> {
        self.run_with_config(input, RunConfig::default()).await
    }

    /// Run the graph to completion with an explicit configuration.
    #[tracing::instrument(
        name = "run_to_completion",
        skip_all,
        fields(run_name = config.run_name.as_deref().unwrap_or(""), recursion_limit = config.recursion_limit)
    )]
    pub async fn run_with_config(&self, input: State, config: RunConfig) -> Result<State> {
        let run = drive(self.core(), input, config, false);
        futures::pin_mut!(run);

        while let Some(item) = run.next().await {
            if let RunItem::Done(result) = item {
                return result;
            }
        }

        Err(GraphError::integrity("run ended without a result"))
    }
}
