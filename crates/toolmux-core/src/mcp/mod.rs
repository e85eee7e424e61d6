//! Tool-server protocol client
//!
//! This module provides the client side of a JSON-RPC 2.0 tool protocol
//! spoken to external tool servers.
//!
//! ## Features
//!
//! - Four transports (stdio process, HTTP, SSE push stream, WebSocket)
//! - One request path per connection with statistics and timeouts
//! - Request/response correlation for the asymmetric transports
//! - A connection manager with heartbeat supervision and auto-reload

pub mod auth;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod server_config;
pub mod sse;
pub mod stats;
pub mod transport;
pub mod types;

pub use auth::AuthConfig;
pub use connection::Connection;
pub use correlator::{Correlator, PendingSlot, RequestIdGenerator};
pub use error::{McpError, McpResult};
pub use manager::{ConnectionFactory, ConnectionManager, ConnectionTest, DefaultConnectionFactory};
pub use protocol::{McpMessage, McpNotification, McpRequest, McpResponse, McpRpcError, RequestId};
pub use server_config::{ServerConfig, TransportKind};
pub use stats::ConnectionStats;
pub use transport::{Transport, build_transport};
pub use types::{
    CallResult, Capability, CapabilitySet, McpContent, McpPrompt, McpResource, McpResourceRef,
    McpTool, ReadResourceParams, ReadResult, ServerInfo,
};
