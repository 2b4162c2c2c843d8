//! Weather agent used by the `stepgraph` binary
//!
//! The model is rule based: a question mentioning known cities becomes one
//! `search` tool call per city, and once the tool results are in it answers
//! with a summary. The search tool always reports the same forecast.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use stepgraph_core::{
    ChatChunk, ChatModel, ChatStream, FnTool, Message, MessageRole, ModelError, Tool, ToolCall,
    ToolError,
};

/// Forecast returned for every query
pub const FORECAST: &str = "Cloudy with a chance of hail.";

/// Default question asked when `--query` is not given
pub const DEFAULT_QUERY: &str = "what is the weather in sf and la";

const CITIES: &[(&str, &str)] = &[
    ("san francisco", "San Francisco"),
    ("los angeles", "Los Angeles"),
    ("new york", "New York"),
    ("sf", "San Francisco"),
    ("la", "Los Angeles"),
    ("nyc", "New York"),
];

/// Cities mentioned in `text`, in order of appearance, with the alias used
fn mentioned_cities(text: &str) -> Vec<(&'static str, &'static str)> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut found: Vec<(usize, &'static str, &'static str)> = Vec::new();
    for &(alias, city) in CITIES {
        let alias_words: Vec<&str> = alias.split(' ').collect();
        let position = words
            .windows(alias_words.len())
            .position(|window| window == alias_words.as_slice());
        if let Some(position) = position {
            if found.iter().all(|&(_, _, known)| known != city) {
                found.push((position, alias, city));
            }
        }
    }
    found.sort_by_key(|(position, _, _)| *position);
    found.into_iter().map(|(_, alias, city)| (alias, city)).collect()
}

/// Chat model answering weather questions with the `search` tool
#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherModel;

impl WeatherModel {
    fn reply(&self, messages: &[Message]) -> Result<Message, ModelError> {
        let last = messages
            .last()
            .ok_or_else(|| ModelError::InvalidResponse("empty conversation".to_string()))?;

        match last.role {
            MessageRole::Tool => Ok(Message::ai(summarize(messages))),
            _ => {
                let question = last.text().unwrap_or_default();
                let cities = mentioned_cities(question);
                if cities.is_empty() {
                    return Ok(Message::ai(
                        "I can look up the weather for San Francisco, Los Angeles or New York.",
                    ));
                }
                let calls = cities
                    .iter()
                    .enumerate()
                    .map(|(index, (alias, _))| {
                        ToolCall::new(
                            format!("call_{index}_{}", alias.replace(' ', "_")),
                            "search",
                            json!({ "query": format!("weather in {alias}") }),
                        )
                    })
                    .collect();
                Ok(Message::ai_tool_calls(calls))
            }
        }
    }
}

/// Final answer built from the tool results that follow the last tool call
fn summarize(messages: &[Message]) -> String {
    let Some(asked) = messages.iter().rposition(Message::has_tool_calls) else {
        return "I could not find any weather reports.".to_string();
    };

    let lines: Vec<String> = messages[asked]
        .tool_calls
        .iter()
        .map(|call| {
            let query = call.args["query"].as_str().unwrap_or_default();
            let city = mentioned_cities(query)
                .first()
                .map(|(_, city)| *city)
                .unwrap_or("Somewhere");
            let report = messages[asked + 1..]
                .iter()
                .find(|m| m.tool_call_id.as_deref() == Some(call.id.as_str()))
                .map(forecast_text)
                .unwrap_or_else(|| "no report".to_string());
            format!("{city}: {report}")
        })
        .collect();
    lines.join(" ")
}

fn forecast_text(message: &Message) -> String {
    let text = message.text().unwrap_or_default();
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => text.to_string(),
    }
}

#[async_trait]
impl ChatModel for WeatherModel {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
        self.reply(messages)
    }

    async fn stream(&self, messages: &[Message]) -> Result<ChatStream, ModelError> {
        let message = self.reply(messages)?;
        let mut chunks: Vec<Result<ChatChunk, ModelError>> = message
            .text()
            .unwrap_or_default()
            .split_inclusive(' ')
            .map(|word| Ok(ChatChunk::Token(word.to_string())))
            .collect();
        chunks.push(Ok(ChatChunk::Done(message)));
        Ok(stream::iter(chunks).boxed())
    }

    fn name(&self) -> &str {
        "weather"
    }
}

/// The canned `search` tool
pub fn search_tool() -> Arc<dyn Tool> {
    let tool = FnTool::new("search", "Search the web for current weather", |args| async move {
        match args.get("query").and_then(Value::as_str) {
            Some(_) => Ok(json!([FORECAST])),
            None => Err(ToolError::invalid_arguments("search", "missing string field 'query'")),
        }
    })
    .with_input_schema(json!({
        "type": "object",
        "properties": {"query": {"type": "string"}},
        "required": ["query"]
    }));
    Arc::new(tool)
}
