//! Conditional routing example
//!
//! Routes on a state value, accumulates a counter through the sum reducer,
//! and prints a snapshot after every node.

use futures::StreamExt;
use stepgraph_core::state::{AppendReducer, FieldKind, OverwriteReducer, StateSchema, SumReducer};
use stepgraph_core::{NodeAction, State, StateGraph, END};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Conditional Routing Example ===\n");

    let schema = StateSchema::new()
        .strict()
        .with_field("value", FieldKind::Number, SumReducer)
        .with_field("action", FieldKind::String, OverwriteReducer)
        .with_field("trail", FieldKind::Array, AppendReducer);
    let mut graph = StateGraph::with_schema(schema);

    graph.add_node("router", NodeAction::sync(|_| Ok(State::new().with("trail", vec!["router"]))))?;

    // Path A: add the current value again (doubling it)
    graph.add_node(
        "double",
        NodeAction::sync(|state: &State| {
            let value = state.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(State::new().with("value", value).with("trail", vec!["double"]))
        }),
    )?;

    // Path B: add 100
    graph.add_node(
        "add",
        NodeAction::sync(|_| Ok(State::new().with("value", 100).with("trail", vec!["add"]))),
    )?;

    graph.set_entry_point("router")?;
    graph.add_conditional_edges(
        "router",
        |state: &State| {
            let action = state.get("action").and_then(|v| v.as_str()).unwrap_or("add");
            println!("Routing decision: {action} path");
            Ok(action.to_string())
        },
        [("double", "double"), ("add", "add")],
    )?;
    graph.set_finish_point("double")?;
    graph.add_edge("add", END)?;

    let compiled = graph.compile()?;

    for action in ["double", "add"] {
        println!("\n--- {action} path ---");
        let input = State::new().with("value", 21).with("action", action);
        let mut steps = compiled.run_streaming(input);
        while let Some(snapshot) = steps.next().await {
            let snapshot = snapshot?;
            println!("step {} ({}): {}", snapshot.step, snapshot.node, snapshot.values.clone().into_value());
        }
    }

    println!("\n--- unknown action ---");
    let input = State::new().with("value", 1).with("action", "divide");
    match compiled.run(input).await {
        Ok(state) => println!("unexpected success: {}", state.into_value()),
        Err(err) => println!("run failed: {err}"),
    }

    Ok(())
}
