//! Integration tests for the stepgraph binary
//!
//! These tests run the compiled binary and check:
//! - JSON-lines output of each driving mode
//! - Run configuration from a YAML file and from flags
//! - Exit status on failed runs

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn stepgraph(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stepgraph"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("STEPGRAPH_CONFIG")
        .env_remove("STEPGRAPH_RECURSION_LIMIT")
        .output()
        .expect("Failed to run stepgraph")
}

fn json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line is not JSON"))
        .collect()
}

#[test]
fn test_invoke_prints_final_conversation() {
    let output = stepgraph(&["invoke"]);
    assert!(output.status.success());

    let messages = json_lines(&output);
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[0]["content"], "what is the weather in sf and la");
    assert_eq!(messages[2]["tool_call_id"], messages[1]["tool_calls"][0]["id"]);
    assert_eq!(messages[3]["tool_call_id"], messages[1]["tool_calls"][1]["id"]);
}

#[test]
fn test_events_for_single_city() {
    let output = stepgraph(&["events", "--query", "what is the weather in sf"]);
    assert!(output.status.success());

    let events = json_lines(&output);
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .filter(|kind| *kind != "model_token")
        .collect();
    assert_eq!(
        kinds,
        [
            "node_start",
            "node_end",
            "node_start",
            "tool_start",
            "tool_end",
            "node_end",
            "node_start",
            "node_end",
            "run_end"
        ]
    );

    let tool_end = events.iter().find(|e| e["event"] == "tool_end").unwrap();
    assert_eq!(tool_end["data"]["output"][0], "Cloudy with a chance of hail.");
}

#[test]
fn test_stream_prints_snapshots() {
    let output = stepgraph(&["stream", "--query", "weather in new york"]);
    assert!(output.status.success());

    let snapshots = json_lines(&output);
    let steps: Vec<u64> = snapshots.iter().map(|s| s["step"].as_u64().unwrap()).collect();
    assert_eq!(steps, [0, 1, 2]);
}

#[test]
fn test_config_file_sets_recursion_limit() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("run.yaml");
    fs::write(&config_path, "recursion_limit: 2\nrun_name: cli-test\n").unwrap();

    let output = stepgraph(&["invoke", "--config", config_path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("recursion limit of 2 steps"));

    // Flags win over the file
    let output = stepgraph(&[
        "invoke",
        "--config",
        config_path.to_str().unwrap(),
        "--recursion-limit",
        "10",
    ]);
    assert!(output.status.success());
}

#[test]
fn test_missing_config_file() {
    let output = stepgraph(&["invoke", "--config", "/nonexistent/stepgraph.yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read config file"));
}

#[test]
fn test_question_without_city_answers_directly() {
    let output = stepgraph(&["invoke", "--query", "hello there"]);
    assert!(output.status.success());

    let messages = json_lines(&output);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["type"], "ai");
}
