//! Error types for prebuilt components
//!
//! # Example
//!
//! ```rust
//! use stepgraph_core::ToolError;
//! use stepgraph_prebuilt::PrebuiltError;
//!
//! let err: PrebuiltError = ToolError::execution("search", "API timeout").into();
//! assert_eq!(err.to_string(), "tool 'search' execution failed: API timeout");
//! ```

use stepgraph_core::{GraphError, ModelError, StateError, ToolError};
use thiserror::Error;

/// Result type for prebuilt operations
pub type Result<T> = std::result::Result<T, PrebuiltError>;

/// Errors that can occur in prebuilt components
#[derive(Error, Debug)]
pub enum PrebuiltError {
    /// Graph construction or execution failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A tool failed and errors are not reported back to the model
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The chat model failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The conversation in the state could not be read or extended
    #[error(transparent)]
    State(#[from] StateError),

    /// Two tools share a name
    #[error("tool '{0}' is registered more than once")]
    DuplicateTool(String),

    /// The tool node ran without a preceding model turn
    #[error("expected the last message to be an ai message, found {0}")]
    NotAnAiMessage(String),
}
