use super::{ChatChunk, ChatModel, ChatStream, ModelError};
use crate::messages::Message;
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Chat model replaying a fixed script of replies
///
/// Each call consumes the next reply. Streaming splits the reply text into
/// word fragments so token events can be observed.
///
/// ```rust
/// use stepgraph_core::llm::{ChatModel, ScriptedChatModel};
/// use stepgraph_core::Message;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let model = ScriptedChatModel::new([Message::ai("It is sunny.")]);
/// let reply = model.invoke(&[Message::human("weather?")]).await.unwrap();
/// assert_eq!(reply.text(), Some("It is sunny."));
/// assert_eq!(model.calls(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<Result<Message, ModelError>>>,
    inputs: Mutex<Vec<Vec<Message>>>,
    calls: AtomicUsize,
}

impl ScriptedChatModel {
    pub fn new(replies: impl IntoIterator<Item = Message>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Append a failing reply to the script
    pub fn then_fail(self, error: ModelError) -> Self {
        self.lock_replies().push_back(Err(error));
        self
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversations received, one per call
    pub fn inputs(&self) -> Vec<Vec<Message>> {
        self.inputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Message, ModelError>>> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self, messages: &[Message]) -> Result<Message, ModelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inputs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());
        self.lock_replies()
            .pop_front()
            .unwrap_or(Err(ModelError::Exhausted(call)))
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
        self.next_reply(messages)
    }

    async fn stream(&self, messages: &[Message]) -> Result<ChatStream, ModelError> {
        let message = self.next_reply(messages)?;
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
        "scripted"
    }
}
