//! Chat-tool orchestration
//!
//! Message types in the OpenAI function-calling shape, the [`ChatModel`]
//! seam, and the bounded loop that feeds tool results back to the model.

pub mod error;
pub mod messages;
pub mod model;
pub mod orchestrator;

pub use error::ChatError;
pub use messages::{
    ChatMessage, FunctionCall, FunctionDefinition, FunctionTool, MessageRole, ToolCall,
};
pub use model::{ChatModel, ChatRequest, ChatResponse};
pub use orchestrator::{ChatOrchestrator, DEFAULT_MAX_ITERATIONS};
