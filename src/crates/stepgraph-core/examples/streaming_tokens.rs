//! Event streaming example
//!
//! A chat node streams its reply through the node's writer; the consumer
//! prints tokens as they arrive, framed by the node boundaries.

use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use stepgraph_core::llm::{collect_chat_stream, ScriptedChatModel};
use stepgraph_core::{ChatModel, Message, NodeAction, State, StateGraph, StreamEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let model = Arc::new(ScriptedChatModel::new([Message::ai(
        "Rust async functions compile to state machines polled by an executor.",
    )]));

    let mut graph = StateGraph::with_messages();
    graph.add_node(
        "chat",
        NodeAction::from_async(move |state: State, ctx| {
            let model = model.clone();
            async move {
                let history = state.messages()?;
                let chunks = model.stream(&history).await?;
                let reply = collect_chat_stream(chunks, ctx.writer()).await?;
                Ok(State::from_messages(vec![reply])?)
            }
        }),
    )?;
    graph.set_entry_point("chat")?.set_finish_point("chat")?;

    let input = State::from_messages(vec![Message::human("How does async work in Rust?")])?;
    let mut events = graph.compile()?.run_with_events(input);

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::NodeStart { node } => println!("[{node}] started"),
            StreamEvent::ModelToken { text, .. } => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            StreamEvent::NodeEnd { node } => println!("\n[{node}] finished"),
            StreamEvent::RunEnd { final_state } => {
                println!("messages in final state: {}", final_state.messages()?.len());
            }
            StreamEvent::RunFailed { error } => println!("run failed: {error}"),
            other => println!("{other:?}"),
        }
    }

    Ok(())
}
