//! Conversation messages and the `add_messages` reducer
//!
//! Message-based graphs keep their conversation under the `messages` state
//! field. Nodes never rewrite that list: they return the messages they want to
//! add, and [`add_messages`] folds them into the history.
//!
//! ```rust
//! use stepgraph_core::messages::{add_messages, Message};
//!
//! let history = vec![Message::human("what's the weather in sf?").with_id("m1")];
//! let update = vec![Message::ai("Let me check.").with_id("m2")];
//!
//! let merged = add_messages(history, update).unwrap();
//! assert_eq!(merged.len(), 2);
//! assert_eq!(merged[1].text(), Some("Let me check."));
//! ```
//!
//! # Merge rules
//!
//! - Messages are appended in the order they appear in the update.
//! - A message whose id already exists in the history replaces it in place.
//! - Messages without an id receive a fresh UUID before merging.
//! - A tool message must answer a tool call issued by an earlier AI message
//!   (in the history or earlier in the same update). Anything else is an
//!   [`StateError::OrphanToolMessage`].

use crate::state::{FieldKind, Reducer, StateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Speaker of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model
    System,
    /// End-user input
    Human,
    /// Model output, possibly carrying tool calls
    Ai,
    /// Result of a tool invocation
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            MessageRole::System => "system",
            MessageRole::Human => "human",
            MessageRole::Ai => "ai",
            MessageRole::Tool => "tool",
        };
        f.write_str(role)
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, echoed back by the answering tool message
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Tool arguments (JSON object)
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// Create a tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Base message type for conversational graphs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier used for replacement on merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Role of the message sender
    #[serde(rename = "type")]
    pub role: MessageRole,

    /// Text or structured content. `Null` for AI messages that only call tools.
    #[serde(default)]
    pub content: Value,

    /// Tool calls (AI messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Id of the answered tool call (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name (tool messages) or author name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: Value) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, Value::String(content.into()))
    }

    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, Value::String(content.into()))
    }

    /// Create an AI message
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Ai, Value::String(content.into()))
    }

    /// Create an AI message that carries tool calls and no text
    pub fn ai_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::new(MessageRole::Ai, Value::Null).with_tool_calls(tool_calls)
    }

    /// Create a tool message answering `tool_call_id`
    pub fn tool(content: impl Into<Value>, tool_call_id: impl Into<String>) -> Self {
        let mut message = Self::new(MessageRole::Tool, content.into());
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Set the message ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the message name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set tool calls (for AI messages)
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Text content, if the content is a string
    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// Whether this is an AI message requesting at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.role == MessageRole::Ai && !self.tool_calls.is_empty()
    }

    /// Ensure this message has an ID (generate one if missing)
    pub fn ensure_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
    }
}

/// Merge `right` into `left` following the message merge rules.
///
/// # Errors
///
/// [`StateError::OrphanToolMessage`] when a tool message of the merged list
/// answers a call id that no earlier AI message issued. Replacing an AI message
/// by id can withdraw calls, so the whole list is checked.
///
/// ```rust
/// use stepgraph_core::messages::{add_messages, Message};
///
/// let left = vec![Message::human("Hello").with_id("1")];
/// let right = vec![Message::human("Hello again").with_id("1")];
///
/// let merged = add_messages(left, right).unwrap();
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].text(), Some("Hello again"));
/// ```
pub fn add_messages(left: Vec<Message>, right: Vec<Message>) -> Result<Vec<Message>, StateError> {
    let mut merged = left;
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.len());

    for (position, message) in merged.iter_mut().enumerate() {
        message.ensure_id();
        if let Some(id) = &message.id {
            index.insert(id.clone(), position);
        }
    }

    for mut message in right {
        message.ensure_id();
        let id = message.id.clone().unwrap_or_default();
        match index.get(&id) {
            Some(&position) => merged[position] = message,
            None => {
                index.insert(id, merged.len());
                merged.push(message);
            }
        }
    }

    check_tool_replies(&merged)?;
    Ok(merged)
}

/// Every tool message must follow the AI message that issued its call.
fn check_tool_replies(messages: &[Message]) -> Result<(), StateError> {
    let mut issued: HashSet<&str> = HashSet::new();
    for message in messages {
        match message.role {
            MessageRole::Ai => issued.extend(message.tool_calls.iter().map(|call| call.id.as_str())),
            MessageRole::Tool => {
                let call_id = message.tool_call_id.as_deref().unwrap_or_default();
                if !issued.contains(call_id) {
                    return Err(StateError::OrphanToolMessage(call_id.to_string()));
                }
            }
            MessageRole::System | MessageRole::Human => {}
        }
    }
    Ok(())
}

/// Reducer wrapping [`add_messages`] for JSON state fields.
///
/// Accepts either a single message object or an array of messages as update.
#[derive(Debug, Clone, Default)]
pub struct MessagesReducer;

impl MessagesReducer {
    fn parse(value: &Value) -> Result<Vec<Message>, StateError> {
        let parsed = match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(_) => serde_json::from_value(value.clone()),
            Value::Object(_) => serde_json::from_value(value.clone()).map(|m| vec![m]),
            other => {
                return Err(StateError::InvalidMessage(format!(
                    "expected a message or a list of messages, got {}",
                    FieldKind::describe(other)
                )))
            }
        };
        parsed.map_err(|e| StateError::InvalidMessage(e.to_string()))
    }
}

impl Reducer for MessagesReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value, StateError> {
        let merged = add_messages(Self::parse(current)?, Self::parse(update)?)?;
        serde_json::to_value(merged).map_err(|e| StateError::InvalidMessage(e.to_string()))
    }

    fn name(&self) -> &str {
        "add_messages"
    }

    fn accepts(&self, kind: FieldKind) -> bool {
        matches!(kind, FieldKind::Messages | FieldKind::Array | FieldKind::Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors_assign_ids() {
        let a = Message::human("hi");
        let b = Message::human("hi");
        assert!(a.id.is_some());
        assert_ne!(a.id, b.id);
        assert_eq!(a.role, MessageRole::Human);
    }

    #[test]
    fn test_serde_shape() {
        let msg = Message::ai_tool_calls(vec![ToolCall::new(
            "call_1",
            "search",
            json!({"query": "sf"}),
        )])
        .with_id("m1");

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "ai");
        assert_eq!(value["tool_calls"][0]["name"], "search");
        assert!(value.get("tool_call_id").is_none());

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_add_messages_appends_in_order() {
        let left = vec![Message::human("1").with_id("a")];
        let right = vec![Message::ai("2").with_id("b"), Message::human("3").with_id("c")];

        let merged = add_messages(left, right).unwrap();
        let ids: Vec<_> = merged.iter().map(|m| m.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_messages_replaces_by_id() {
        let left = vec![
            Message::human("q").with_id("a"),
            Message::ai("draft").with_id("b"),
        ];
        let right = vec![Message::ai("final").with_id("b")];

        let merged = add_messages(left, right).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].text(), Some("final"));
    }

    #[test]
    fn test_add_messages_assigns_missing_ids() {
        let mut msg = Message::human("no id");
        msg.id = None;

        let merged = add_messages(vec![], vec![msg]).unwrap();
        assert!(merged[0].id.is_some());
    }

    #[test]
    fn test_tool_message_requires_prior_call() {
        let err = add_messages(vec![Message::human("q")], vec![Message::tool("sunny", "call_9")])
            .unwrap_err();
        assert!(matches!(err, StateError::OrphanToolMessage(ref id) if id == "call_9"));
    }

    #[test]
    fn test_tool_message_answering_same_batch_call() {
        let call = ToolCall::new("call_1", "search", json!({}));
        let right = vec![
            Message::ai_tool_calls(vec![call]),
            Message::tool("sunny", "call_1").with_name("search"),
        ];

        let merged = add_messages(vec![], right).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].role, MessageRole::Tool);
    }

    #[test]
    fn test_replacing_ai_message_cannot_withdraw_answered_calls() {
        let call = ToolCall::new("c1", "search", json!({}));
        let left = vec![
            Message::human("q").with_id("h"),
            Message::ai_tool_calls(vec![call]).with_id("a"),
            Message::tool("sunny", "c1").with_id("t"),
        ];

        let err = add_messages(left, vec![Message::ai("no calls").with_id("a")]).unwrap_err();
        assert!(matches!(err, StateError::OrphanToolMessage(ref id) if id == "c1"));
    }

    #[test]
    fn test_tool_message_cannot_precede_its_call() {
        let left = vec![Message::human("q").with_id("h")];
        let right = vec![
            Message::tool("sunny", "c1").with_id("h"),
            Message::ai_tool_calls(vec![ToolCall::new("c1", "search", json!({}))]),
        ];

        let err = add_messages(left, right).unwrap_err();
        assert!(matches!(err, StateError::OrphanToolMessage(ref id) if id == "c1"));
    }

    #[test]
    fn test_reducer_accepts_single_object() {
        let current = serde_json::to_value(vec![Message::human("q").with_id("a")]).unwrap();
        let update = serde_json::to_value(Message::ai("a").with_id("b")).unwrap();

        let merged = MessagesReducer.reduce(&current, &update).unwrap();
        assert_eq!(merged.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_reducer_rejects_scalar_update() {
        let err = MessagesReducer.reduce(&Value::Null, &json!(42)).unwrap_err();
        assert!(matches!(err, StateError::InvalidMessage(_)));
    }
}
