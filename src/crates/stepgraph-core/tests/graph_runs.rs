//! Integration tests for complete graph runs
//!
//! These tests drive compiled graphs through the public API only: message
//! graphs with a scripted model, streaming model tokens, and run metadata.

use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use stepgraph_core::llm::{collect_chat_stream, ScriptedChatModel};
use stepgraph_core::{
    ChatModel, GraphError, Message, MessageRole, NodeAction, RunConfig, State, StateGraph,
    StreamEvent, END,
};

fn chat_graph(model: Arc<ScriptedChatModel>) -> StateGraph {
    let mut graph = StateGraph::with_messages();
    graph
        .add_node(
            "chat",
            NodeAction::from_async(move |state: State, ctx| {
                let model = model.clone();
                async move {
                    let history = state.messages()?;
                    let reply = if ctx.writer().is_streaming() {
                        let chunks = model.stream(&history).await?;
                        collect_chat_stream(chunks, ctx.writer()).await?
                    } else {
                        model.invoke(&history).await?
                    };
                    Ok(State::from_messages(vec![reply])?)
                }
            }),
        )
        .unwrap();
    graph.set_entry_point("chat").unwrap();
    graph.set_finish_point("chat").unwrap();
    graph
}

/// A single model turn appends the reply after the input
#[tokio::test]
async fn test_chat_turn_appends_reply() {
    let model = Arc::new(ScriptedChatModel::new([Message::ai("Hello there.")]));
    let compiled = chat_graph(model.clone()).compile().unwrap();

    let input = State::from_messages(vec![Message::human("hi")]).unwrap();
    let output = compiled.run(input).await.unwrap();

    let messages = output.messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::Human);
    assert_eq!(messages[1].text(), Some("Hello there."));
    assert!(messages.iter().all(|m| m.id.is_some()));
    assert_eq!(model.calls(), 1);
}

/// Streamed tokens arrive between the node boundaries and rebuild the reply
#[tokio::test]
async fn test_streamed_tokens_match_reply() {
    let model = Arc::new(ScriptedChatModel::new([Message::ai("Cloudy with a chance of hail.")]));
    let compiled = chat_graph(model).compile().unwrap();

    let input = State::from_messages(vec![Message::human("weather?")]).unwrap();
    let events: Vec<StreamEvent> = compiled.run_with_events(input).collect().await;

    assert_eq!(events.first(), Some(&StreamEvent::NodeStart { node: "chat".into() }));
    let end = events
        .iter()
        .position(|e| matches!(e, StreamEvent::NodeEnd { .. }))
        .unwrap();

    let text: String = events[1..end]
        .iter()
        .map(|event| match event {
            StreamEvent::ModelToken { node, text } => {
                assert_eq!(node, "chat");
                text.as_str()
            }
            other => panic!("unexpected event inside node: {other:?}"),
        })
        .collect();
    assert_eq!(text, "Cloudy with a chance of hail.");

    match events.last() {
        Some(StreamEvent::RunEnd { final_state }) => {
            let last = final_state.last_message().unwrap().unwrap();
            assert_eq!(last.text(), Some("Cloudy with a chance of hail."));
        }
        other => panic!("unexpected last event: {other:?}"),
    }
}

/// A failing model call surfaces as a node execution error
#[tokio::test]
async fn test_model_failure_fails_run() {
    let model = Arc::new(ScriptedChatModel::new([]));
    let compiled = chat_graph(model).compile().unwrap();

    let input = State::from_messages(vec![Message::human("anyone?")]).unwrap();
    let err = compiled.run(input.clone()).await.unwrap_err();
    assert!(matches!(err, GraphError::NodeExecution { ref node, .. } if node == "chat"));

    let events: Vec<_> = compiled.run_with_events(input).collect().await;
    let kinds: Vec<_> = events.iter().map(StreamEvent::kind).collect();
    assert_eq!(kinds, ["node_start", "run_failed"]);
}

/// Tool messages must answer a tool call already present in the conversation
#[tokio::test]
async fn test_orphan_tool_message_rejected_at_input() {
    let model = Arc::new(ScriptedChatModel::new([Message::ai("unused")]));
    let compiled = chat_graph(model.clone()).compile().unwrap();

    let input = State::from_value(json!({
        "messages": [{"type": "tool", "content": "42", "tool_call_id": "call_missing"}]
    }))
    .unwrap();

    let err = compiled.run(input).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput(_)));
    assert_eq!(model.calls(), 0);
}

/// Every run gets its own id unless one is configured
#[tokio::test]
async fn test_run_ids() {
    let mut graph = StateGraph::new();
    graph
        .add_node(
            "stamp",
            NodeAction::from_async(|_, ctx| async move {
                Ok(State::new()
                    .with("run_id", ctx.run_id().to_string())
                    .with("run_name", ctx.config().run_name.clone().unwrap_or_default()))
            }),
        )
        .unwrap();
    graph.set_entry_point("stamp").unwrap().set_finish_point("stamp").unwrap();
    let compiled = graph.compile().unwrap();

    let first = compiled.run(State::new()).await.unwrap();
    let second = compiled.run(State::new()).await.unwrap();
    assert_ne!(first.get("run_id"), second.get("run_id"));

    let fixed = uuid::Uuid::new_v4();
    let config = RunConfig {
        run_id: Some(fixed),
        ..RunConfig::new().with_run_name("nightly")
    };
    let third = compiled.run_with_config(State::new(), config).await.unwrap();
    assert_eq!(third.get("run_id"), Some(&json!(fixed.to_string())));
    assert_eq!(third.get("run_name"), Some(&json!("nightly")));
}

/// Events serialize as tagged JSON objects
#[tokio::test]
async fn test_event_wire_format() {
    let mut graph = StateGraph::new();
    graph
        .add_node("only", NodeAction::sync(|_| Ok(State::new().with("done", true))))
        .unwrap();
    graph.set_entry_point("only").unwrap();
    graph.add_edge("only", END).unwrap();

    let events: Vec<_> = graph
        .compile()
        .unwrap()
        .run_with_events(State::new())
        .map(|event| serde_json::to_value(event).unwrap())
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            json!({"event": "node_start", "data": {"node": "only"}}),
            json!({"event": "node_end", "data": {"node": "only"}}),
            json!({"event": "run_end", "data": {"final_state": {"done": true}}}),
        ]
    );
}

/// The compiled structure is serializable and stable
#[test]
fn test_structure_json() {
    let mut graph = StateGraph::new();
    graph.add_node("a", NodeAction::sync(|_| Ok(State::new()))).unwrap();
    graph
        .add_conditional_edges("a", |_: &State| Ok("stop".to_string()), [("stop", END), ("loop", "a")])
        .unwrap();
    graph.set_entry_point("a").unwrap();

    let structure = serde_json::to_value(graph.compile().unwrap().structure()).unwrap();
    assert_eq!(
        structure,
        json!({
            "entry": "a",
            "nodes": ["a"],
            "edges": {"a": {"kind": "conditional", "to": {"loop": "a", "stop": "__end__"}}},
            "terminal": "__end__"
        })
    );
}
