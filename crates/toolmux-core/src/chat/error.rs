//! Chat loop errors

use thiserror::Error;

/// Error raised by the chat-tool loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The model call failed
    #[error("Model error: {0}")]
    Model(String),

    /// The iteration budget ran out with no assistant message to return
    #[error("Iteration budget exhausted after {max} iterations")]
    IterationBudgetExhausted { max: usize },

    /// The chat turn was cancelled
    #[error("Chat was cancelled")]
    Cancelled,
}

impl ChatError {
    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }
}
