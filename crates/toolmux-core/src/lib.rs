//! Toolmux Core Library
//!
//! Connects to a set of independently configured tool servers over stdio,
//! HTTP, SSE or WebSocket, keeps those connections healthy, and exposes the
//! discovered tools to a chat model through an OpenAI-shaped bridge.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolmux_core::{ConnectionManager, InMemoryConfigStore, ServerConfig, ToolBridge};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(InMemoryConfigStore::new());
//! store.insert(ServerConfig::http("calc", "http://localhost:8080/rpc"));
//!
//! let manager = ConnectionManager::new(store);
//! let connected = manager.initialize().await?;
//! assert_eq!(connected, 1);
//!
//! let bridge = ToolBridge::new(manager.clone());
//! let output = bridge
//!     .execute_by_qualified_name("calc__add", r#"{"a":2,"b":3}"#, &CancellationToken::new())
//!     .await?;
//! assert_eq!(output.content, "5");
//! ```

pub mod bridge;
pub mod chat;
pub mod config;
pub mod mcp;
pub mod store;

pub use bridge::{ToolBridge, ToolOutput, ToolSnapshot};
pub use chat::{ChatError, ChatMessage, ChatModel, ChatOrchestrator, ChatRequest, ChatResponse};
pub use config::{Settings, SettingsError};
pub use mcp::{
    AuthConfig, Connection, ConnectionFactory, ConnectionManager, ConnectionStats, ConnectionTest,
    McpError, McpResult, ServerConfig, ServerInfo, TransportKind,
};
pub use store::{ConfigStore, InMemoryConfigStore};
