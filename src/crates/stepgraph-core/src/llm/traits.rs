use crate::messages::{Message, MessageRole};
use crate::runtime::StreamWriter;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a language-model collaborator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// The provider could not be reached or the request failed in transit
    #[error("model transport failed: {0}")]
    Transport(String),

    /// The provider answered with something that is not a usable message
    #[error("model returned an invalid response: {0}")]
    InvalidResponse(String),

    /// A streamed reply ended without its final message
    #[error("model stream ended without a final message")]
    IncompleteStream,

    /// A scripted model ran out of replies
    #[error("scripted model has no reply left (call #{0})")]
    Exhausted(usize),
}

/// One item of a streamed model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ChatChunk {
    /// Incremental text fragment
    Token(String),
    /// The complete `ai` message; always the last chunk
    Done(Message),
}

/// Stream of chunks produced by [`ChatModel::stream`]
pub type ChatStream = BoxStream<'static, Result<ChatChunk, ModelError>>;

/// Trait for chat-based language models
///
/// Implementations must be `Send + Sync`; share them across nodes as
/// `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce one complete `ai` message for the conversation.
    async fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError>;

    /// Stream the reply as text fragments followed by the complete message.
    ///
    /// The default implementation calls [`invoke`](Self::invoke) and emits the
    /// whole text as a single fragment.
    async fn stream(&self, messages: &[Message]) -> Result<ChatStream, ModelError> {
        let message = self.invoke(messages).await?;
        let mut chunks = Vec::with_capacity(2);
        if let Some(text) = message.text().filter(|text| !text.is_empty()) {
            chunks.push(Ok(ChatChunk::Token(text.to_string())));
        }
        chunks.push(Ok(ChatChunk::Done(message)));
        Ok(stream::iter(chunks).boxed())
    }

    /// Name used in logs
    fn name(&self) -> &str {
        "chat_model"
    }
}

/// Drain a chat stream, forwarding every fragment as a `model_token` event.
///
/// Returns the final message. When the final message carries no content but
/// fragments were streamed, the fragments become its content.
pub async fn collect_chat_stream(
    mut chunks: ChatStream,
    writer: &StreamWriter,
) -> Result<Message, ModelError> {
    let mut streamed = String::new();
    let mut fragments = 0usize;

    while let Some(chunk) = chunks.next().await {
        match chunk? {
            ChatChunk::Token(text) => {
                streamed.push_str(&text);
                fragments += 1;
                writer.model_token(text).await;
            }
            ChatChunk::Done(mut message) => {
                if message.role != MessageRole::Ai {
                    return Err(ModelError::InvalidResponse(format!(
                        "expected an ai message, got {}",
                        message.role
                    )));
                }
                if message.content.is_null() && fragments > 0 {
                    message.content = Value::String(streamed);
                }
                return Ok(message);
            }
        }
    }

    Err(ModelError::IncompleteStream)
}
