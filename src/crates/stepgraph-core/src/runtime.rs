//! Runtime context handed to asynchronous node capabilities
//!
//! ```rust,no_run
//! use stepgraph_core::{NodeAction, State};
//!
//! let node = NodeAction::from_async(|_state: State, ctx| async move {
//!     if ctx.writer().is_streaming() {
//!         ctx.writer().model_token("thinking...").await;
//!     }
//!     Ok(State::new().with("step", ctx.step() as u64))
//! });
//! ```

use crate::config::RunConfig;
use crate::graph::NodeId;
use crate::stream::StreamEvent;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Emits events on behalf of one node of one run
///
/// When nobody consumes the event stream the writer is disabled and every
/// call is a no-op. Sending never fails: once the consumer has gone away,
/// events are dropped.
#[derive(Debug, Clone)]
pub struct StreamWriter {
    node: NodeId,
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl StreamWriter {
    pub(crate) fn new(node: NodeId, tx: Option<mpsc::Sender<StreamEvent>>) -> Self {
        Self { node, tx }
    }

    /// Writer that discards everything
    pub fn disabled(node: impl Into<NodeId>) -> Self {
        Self::new(node.into(), None)
    }

    /// Whether a consumer is listening for events
    pub fn is_streaming(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Emit a `model_token` event
    pub async fn model_token(&self, text: impl Into<String>) {
        self.emit(StreamEvent::ModelToken {
            node: self.node.clone(),
            text: text.into(),
        })
        .await
    }

    /// Emit a `tool_start` event
    pub async fn tool_start(&self, tool: &str, arguments: &Value) {
        self.emit(StreamEvent::ToolStart {
            node: self.node.clone(),
            tool: tool.to_string(),
            arguments: arguments.clone(),
        })
        .await
    }

    /// Emit a `tool_end` event
    pub async fn tool_end(&self, tool: &str, output: &Value) {
        self.emit(StreamEvent::ToolEnd {
            node: self.node.clone(),
            tool: tool.to_string(),
            output: output.clone(),
        })
        .await
    }

    async fn emit(&self, event: StreamEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                tracing::trace!(node = %self.node, "event stream closed, dropping event");
            }
        }
    }
}

/// Context of a single node invocation
#[derive(Debug, Clone)]
pub struct NodeContext {
    node: NodeId,
    step: usize,
    run_id: Uuid,
    config: Arc<RunConfig>,
    writer: StreamWriter,
}

impl NodeContext {
    pub(crate) fn new(
        node: NodeId,
        step: usize,
        run_id: Uuid,
        config: Arc<RunConfig>,
        writer: StreamWriter,
    ) -> Self {
        Self {
            node,
            step,
            run_id,
            config,
            writer,
        }
    }

    /// Context outside of any run, with a disabled writer
    ///
    /// Useful to call a node capability directly, e.g. in tests.
    pub fn detached(node: impl Into<NodeId>) -> Self {
        let node = node.into();
        Self::new(
            node.clone(),
            0,
            Uuid::new_v4(),
            Arc::new(RunConfig::default()),
            StreamWriter::disabled(node),
        )
    }

    /// Id of the node being executed
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Zero-based step index within the run
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn writer(&self) -> &StreamWriter {
        &self.writer
    }
}
