//! # stepgraph
//!
//! Runs the weather agent in one of the three driving modes and prints the
//! result as JSON lines on stdout. Logs go to stderr.

mod demo;
mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use stepgraph_core::{CompiledGraph, Message, RunConfig, State, StreamEvent};
use stepgraph_prebuilt::{create_agent_executor, create_react_agent};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stepgraph")]
#[command(about = "Run the stepgraph weather agent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Question asked to the agent
    #[arg(short, long, global = true, default_value = demo::DEFAULT_QUERY)]
    query: String,

    /// YAML file with the run configuration
    #[arg(short, long, global = true, env = "STEPGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum node executions, overrides the config file
    #[arg(long, global = true, env = "STEPGRAPH_RECURSION_LIMIT")]
    recursion_limit: Option<usize>,

    /// Log filter (for example `debug` or `stepgraph_core=trace`); defaults to RUST_LOG, then `info`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Agent graph to run
    #[arg(long, global = true, value_enum, default_value_t = AgentKind::Executor)]
    agent: AgentKind,
}

#[derive(Subcommand)]
enum Commands {
    /// Run to completion and print the final conversation
    Invoke,

    /// Print the state after every node
    Stream,

    /// Print every event, including model tokens and tool calls
    Events,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AgentKind {
    /// `agent` and `action` nodes
    Executor,
    /// `agent` and `tools` nodes with a system prompt
    React,
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_agent(kind: AgentKind) -> Result<CompiledGraph> {
    let model = Arc::new(demo::WeatherModel);
    let tools = vec![demo::search_tool()];
    let graph = match kind {
        AgentKind::Executor => create_agent_executor(model, tools)?,
        AgentKind::React => create_react_agent(model, tools)
            .with_system_prompt("You are a weather assistant. Use the search tool for forecasts.")
            .build()?,
    };
    Ok(graph)
}

fn print_line(out: &mut impl Write, item: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *out, item)?;
    writeln!(out)?;
    Ok(())
}

async fn invoke(graph: &CompiledGraph, input: State, config: RunConfig, out: &mut impl Write) -> Result<()> {
    let output = graph.run_with_config(input, config).await?;
    let messages: Vec<Message> = output.messages()?;
    for message in &messages {
        print_line(out, message)?;
    }
    Ok(())
}

async fn stream(graph: &CompiledGraph, input: State, config: RunConfig, out: &mut impl Write) -> Result<()> {
    let mut snapshots = graph.run_streaming_with_config(input, config);
    while let Some(snapshot) = snapshots.next().await {
        print_line(out, &snapshot?)?;
    }
    Ok(())
}

async fn events(graph: &CompiledGraph, input: State, config: RunConfig, out: &mut impl Write) -> Result<()> {
    let mut events = graph.run_with_events_with_config(input, config);
    while let Some(event) = events.next().await {
        print_line(out, &event)?;
        if let StreamEvent::RunFailed { error } = event {
            bail!("run failed: {error}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let config = settings::resolve(cli.config.as_deref(), cli.recursion_limit)?;
    let graph = build_agent(cli.agent)?;
    let input = State::from_messages(vec![Message::human(cli.query.as_str())])?;
    tracing::info!(agent = ?cli.agent, query = %cli.query, "starting run");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Invoke => invoke(&graph, input, config, &mut out).await?,
        Commands::Stream => stream(&graph, input, config, &mut out).await?,
        Commands::Events => events(&graph, input, config, &mut out).await?,
    }
    out.flush()?;

    Ok(())
}
