//! Transport layer implementations
//!
//! ## Available Transports
//!
//! - **Stdio**: child process speaking newline-delimited JSON
//! - **HTTP**: one POST per request with a synchronous reply
//! - **SSE**: long-lived event stream for replies, POST control endpoint for requests
//! - **WebSocket**: full-duplex text frames with a protocol-level keepalive
//!
//! The variant is chosen once from [`TransportKind`] by [`build_transport`].

pub mod http;
pub mod process;
pub mod sse;
pub mod websocket;

pub use http::HttpTransport;
pub use process::ProcessTransport;
pub use sse::SseTransport;
pub use websocket::WebSocketTransport;

use super::error::McpResult;
use super::protocol::{McpNotification, McpRequest, McpResponse};
use super::server_config::{ServerConfig, TransportKind};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// One way of exchanging protocol messages with a server
///
/// Implementations use interior mutability so a connection can issue
/// concurrent requests through a shared reference.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying channel
    async fn connect(&self) -> McpResult<()>;

    /// Send a request and wait for its response
    async fn request(&self, request: McpRequest, cancel: &CancellationToken)
    -> McpResult<McpResponse>;

    /// Send a notification (no response expected)
    async fn notify(&self, notification: McpNotification) -> McpResult<()>;

    /// Close the channel; closing a closed transport is a no-op
    async fn close(&self) -> McpResult<()>;

    /// Whether the channel is open
    fn is_connected(&self) -> bool;

    /// Transport kind
    fn kind(&self) -> TransportKind;
}

/// Build the transport matching `config.transport`
pub fn build_transport(config: &ServerConfig) -> McpResult<Box<dyn Transport>> {
    Ok(match config.transport {
        TransportKind::Stdio => Box::new(ProcessTransport::new(config)?),
        TransportKind::Http => Box::new(HttpTransport::new(config)?),
        TransportKind::Sse => Box::new(SseTransport::new(config)?),
        TransportKind::Websocket => Box::new(WebSocketTransport::new(config)?),
    })
}
