//! Language-model collaborator contract
//!
//! The engine does not ship provider clients. Model-invoking nodes depend on
//! the [`ChatModel`] trait, which users implement for their provider:
//!
//! - [`ChatModel::invoke`] returns one complete `ai` [`Message`](crate::Message).
//! - [`ChatModel::stream`] yields [`ChatChunk::Token`] fragments followed by
//!   exactly one [`ChatChunk::Done`] carrying the complete message.
//!
//! [`collect_chat_stream`] drains such a stream inside a node, forwarding every
//! fragment as a `model_token` event through the node's
//! [`StreamWriter`](crate::StreamWriter).
//!
//! [`ScriptedChatModel`] replays canned replies and is used by tests and the
//! demo binary.

mod mock;
mod traits;

pub use mock::ScriptedChatModel;
pub use traits::{collect_chat_stream, ChatChunk, ChatModel, ChatStream, ModelError};
