//! Step scheduler: the sequential walk over a compiled graph
//!
//! ```text
//!   Pending(entry)
//!       │ begin()             recursion limit checked here
//!       ▼
//!   Running(node) ── capability fails ──────────────┐
//!       │ merge(patch)                              │
//!       ▼                                           ▼
//!   Merged(node) ─── reducer / router fails ───▶ Failed
//!       │ route()
//!       ├── destination == END ──▶ Terminated
//!       └── otherwise ───────────▶ Pending(destination)
//! ```
//!
//! [`StepScheduler`] holds the transitions and is fully synchronous. The async
//! driver ([`drive`]) wraps it in a lazily-polled stream: a node is only
//! started when the consumer asks for the next item, so a consumer that stops
//! reading never causes another node to run.

use crate::compiled::GraphCore;
use crate::config::RunConfig;
use crate::error::{BoxError, GraphError, Result};
use crate::graph::{Edge, NodeAction, NodeId, END};
use crate::runtime::{NodeContext, StreamWriter};
use crate::state::State;
use crate::stream::{StateSnapshot, StreamEvent};
use async_stream::stream;
use futures::Stream;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

/// Scheduler phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Waiting to start the node
    Pending(NodeId),
    /// Node capability in flight
    Running(NodeId),
    /// Patch of the node merged, edges not yet resolved
    Merged(NodeId),
    /// Terminal marker reached
    Terminated,
    /// Run aborted
    Failed,
}

/// Synchronous state machine of a single run
pub(crate) struct StepScheduler {
    core: Arc<GraphCore>,
    state: State,
    phase: Phase,
    steps: usize,
    limit: usize,
}

impl StepScheduler {
    /// Validate the input and enter `Pending(entry)`.
    ///
    /// The input is folded into an empty state through the schema reducers,
    /// so message ids are assigned and tool messages checked up front.
    pub(crate) fn start(core: Arc<GraphCore>, input: &State, limit: usize) -> Result<Self> {
        core.schema.validate_state(input)?;
        let state = core.schema.merge(&State::new(), input)?;
        let phase = Phase::Pending(core.graph.entry.clone());

        Ok(Self {
            core,
            state,
            phase,
            steps: 0,
            limit,
        })
    }

    pub(crate) fn phase(&self) -> &Phase {
        &self.phase
    }

    pub(crate) fn state(&self) -> &State {
        &self.state
    }

    /// Index of the current (or next) step
    pub(crate) fn step(&self) -> usize {
        self.steps
    }

    pub(crate) fn into_state(self) -> State {
        self.state
    }

    pub(crate) fn fail(&mut self) {
        self.phase = Phase::Failed;
    }

    fn guard<T>(&mut self, outcome: Result<T>) -> Result<T> {
        if outcome.is_err() {
            self.fail();
        }
        outcome
    }

    fn unexpected(&self, operation: &str) -> GraphError {
        GraphError::integrity(format!("cannot {operation} while {:?}", self.phase))
    }

    /// `Pending(node)` -> `Running(node)`; `None` once terminated.
    pub(crate) fn begin(&mut self) -> Result<Option<(NodeId, NodeAction)>> {
        let node = match &self.phase {
            Phase::Pending(node) => node.clone(),
            Phase::Terminated => return Ok(None),
            _ => {
                let err = self.unexpected("start a node");
                return self.guard(Err(err));
            }
        };

        if self.steps >= self.limit {
            return self.guard(Err(GraphError::RecursionLimit { limit: self.limit }));
        }

        let action = match self.core.graph.nodes.get(&node) {
            Some(action) => action.clone(),
            None => return self.guard(Err(GraphError::UnknownNode(node))),
        };

        tracing::debug!(node = %node, step = self.steps, "node started");
        self.phase = Phase::Running(node.clone());
        Ok(Some((node, action)))
    }

    /// `Running(node)` -> `Merged(node)`, returning the post-merge snapshot.
    pub(crate) fn merge(&mut self, patch: &State) -> Result<StateSnapshot> {
        let node = match &self.phase {
            Phase::Running(node) => node.clone(),
            _ => {
                let err = self.unexpected("merge a patch");
                return self.guard(Err(err));
            }
        };

        let merged = self
            .core
            .schema
            .merge(&self.state, patch)
            .map_err(|source| GraphError::Reducer {
                node: node.clone(),
                source,
            });
        self.state = self.guard(merged)?;

        tracing::debug!(node = %node, step = self.steps, fields = patch.len(), "patch merged");
        let snapshot = StateSnapshot {
            step: self.steps,
            node: node.clone(),
            values: self.state.clone(),
        };
        self.steps += 1;
        self.phase = Phase::Merged(node);
        Ok(snapshot)
    }

    /// `Merged(node)` -> `Pending(next)` or `Terminated`.
    ///
    /// Routers see the post-merge state.
    pub(crate) fn route(&mut self) -> Result<&Phase> {
        let node = match &self.phase {
            Phase::Merged(node) => node.clone(),
            _ => {
                let err = self.unexpected("route");
                return self.guard(Err(err));
            }
        };

        let destination = self.resolve(&node);
        let destination = self.guard(destination)?;

        tracing::debug!(from = %node, to = %destination, "edge resolved");
        self.phase = if destination == END {
            Phase::Terminated
        } else {
            Phase::Pending(destination)
        };
        Ok(&self.phase)
    }

    fn resolve(&self, node: &str) -> Result<NodeId> {
        let edge = self
            .core
            .graph
            .edges
            .get(node)
            .ok_or_else(|| GraphError::integrity(format!("node '{node}' has no outgoing edge")))?;

        match edge {
            Edge::Direct(to) => Ok(to.clone()),
            Edge::Conditional { router, path_map } => {
                let label = router(&self.state).map_err(|source| GraphError::RouterFailed {
                    node: node.to_string(),
                    source,
                })?;
                path_map.get(&label).cloned().ok_or(GraphError::Routing {
                    node: node.to_string(),
                    label,
                })
            }
        }
    }
}

/// Item produced by the run driver
#[derive(Debug)]
pub(crate) enum RunItem {
    Event(StreamEvent),
    Snapshot(StateSnapshot),
    Done(Result<State>),
}

enum Progress {
    Event(StreamEvent),
    Settled(Result<State>),
}

/// Invoke a node capability with an owned snapshot.
///
/// Asynchronous capabilities run on their own task: dropping the returned
/// future detaches the task, which still runs to completion. A panic in either
/// kind of capability fails the node instead of unwinding into the consumer.
async fn invoke_node(node: NodeId, action: NodeAction, snapshot: State, ctx: NodeContext) -> Result<State> {
    let outcome = match action {
        NodeAction::Sync(func) => match panic::catch_unwind(AssertUnwindSafe(|| func(&snapshot))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(BoxError::from(format!("panicked with message {:?}", panic_message(&*payload)))),
        },
        NodeAction::Async(func) => match tokio::spawn(func(snapshot, ctx).in_current_span()).await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(Box::new(join_error) as BoxError),
        },
    };
    outcome.map_err(|source| GraphError::NodeExecution { node, source })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "Box<dyn Any>"
    }
}

fn failure(run_id: Uuid, error: GraphError) -> [RunItem; 2] {
    tracing::error!(%run_id, node = error.node().unwrap_or("-"), error = %error, "run failed");
    [
        RunItem::Event(StreamEvent::RunFailed {
            error: error.to_string(),
        }),
        RunItem::Done(Err(error)),
    ]
}

/// Drive one run of `core` as a lazy stream of [`RunItem`]s.
///
/// With `observe` set, node capabilities get an enabled [`StreamWriter`]
/// and their events are interleaved between `node_start` and `node_end`.
/// The stream always ends with a single `Done` item.
pub(crate) fn drive(
    core: Arc<GraphCore>,
    input: State,
    config: RunConfig,
    observe: bool,
) -> impl Stream<Item = RunItem> + Send + 'static {
    let config = Arc::new(config.for_run());
    let run_id = config.run_id.unwrap_or_default();
    let span = tracing::info_span!(
        "graph_run",
        %run_id,
        run_name = config.run_name.as_deref().unwrap_or(""),
        observe
    );

    let mut run = Box::pin(stream! {
        tracing::debug!(%run_id, run_name = ?config.run_name, tags = ?config.tags, "run started");

        let mut scheduler = match StepScheduler::start(core, &input, config.recursion_limit) {
            Ok(scheduler) => scheduler,
            Err(error) => {
                for item in failure(run_id, error) {
                    yield item;
                }
                return;
            }
        };

        let (tx, mut rx) = mpsc::channel::<StreamEvent>(config.stream_buffer.max(1));

        loop {
            let (node, action) = match scheduler.begin() {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(error) => {
                    for item in failure(run_id, error) {
                        yield item;
                    }
                    return;
                }
            };
            yield RunItem::Event(StreamEvent::NodeStart { node: node.clone() });

            let writer = StreamWriter::new(node.clone(), observe.then(|| tx.clone()));
            let ctx = NodeContext::new(node.clone(), scheduler.step(), run_id, config.clone(), writer);
            let invocation = invoke_node(node.clone(), action, scheduler.state().clone(), ctx);
            tokio::pin!(invocation);

            let outcome = loop {
                let progress = tokio::select! {
                    biased;
                    Some(event) = rx.recv() => Progress::Event(event),
                    outcome = &mut invocation => Progress::Settled(outcome),
                };
                match progress {
                    Progress::Event(event) => {
                        yield RunItem::Event(event);
                    }
                    Progress::Settled(outcome) => break outcome,
                }
            };
            while let Ok(event) = rx.try_recv() {
                yield RunItem::Event(event);
            }

            let merged = match outcome {
                Ok(patch) => scheduler.merge(&patch),
                Err(error) => {
                    scheduler.fail();
                    Err(error)
                }
            };
            match merged {
                Ok(snapshot) => {
                    yield RunItem::Snapshot(snapshot);
                }
                Err(error) => {
                    for item in failure(run_id, error) {
                        yield item;
                    }
                    return;
                }
            }
            yield RunItem::Event(StreamEvent::NodeEnd { node: node.clone() });

            if let Err(error) = scheduler.route() {
                for item in failure(run_id, error) {
                    yield item;
                }
                return;
            }
        }

        debug_assert_eq!(scheduler.phase(), &Phase::Terminated);
        let final_state = scheduler.into_state();
        tracing::debug!(%run_id, "run terminated");
        yield RunItem::Event(StreamEvent::RunEnd { final_state: final_state.clone() });
        yield RunItem::Done(Ok(final_state));
    });

    futures::stream::poll_fn(move |cx| {
        let _entered = span.enter();
        run.as_mut().poll_next(cx)
    })
}
