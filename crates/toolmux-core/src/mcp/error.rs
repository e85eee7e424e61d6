//! Error taxonomy for tool-server connections
//!
//! Every failure that leaves this module is one of the [`McpError`] variants,
//! so callers (manager, bridge, admin surfaces) can log and display them
//! uniformly.

use super::protocol::{McpRpcError, methods};
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the connection layer
pub type McpResult<T> = Result<T, McpError>;

/// JSON-RPC error codes, standard and subsystem-specific
pub mod codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method (or tool) not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Tool execution failed on the server
    pub const TOOL_EXECUTION: i32 = -32000;
    /// Resource could not be accessed
    pub const RESOURCE_ACCESS: i32 = -32001;
    /// Connection-level failure
    pub const CONNECTION: i32 = -32002;
    /// Authentication failure
    pub const AUTHENTICATION: i32 = -32003;
    /// Request timed out
    pub const TIMEOUT: i32 = -32004;
}

/// Connection-layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum McpError {
    /// Operation requires a live connection
    #[error("Not connected")]
    NotConnected,

    /// `connect` called on a live connection
    #[error("Already connected")]
    AlreadyConnected,

    /// Tool/resource call issued before `initialize`
    #[error("Connection not initialized")]
    NotInitialized,

    /// `initialize` called twice
    #[error("Connection already initialized")]
    AlreadyInitialized,

    /// Unknown transport kind or an attempt to change it
    #[error("Invalid transport: {0}")]
    InvalidTransport(String),

    /// Request could not be built or was rejected as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Tool unknown to the server
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Resource unknown to the server
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Tool ran but reported failure
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// No response within the allowed time
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// JSON-RPC error returned by the server
    #[error("Server error {code}: {message}")]
    Server { code: i32, message: String },

    /// Credentials missing locally or rejected remotely
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Stream, socket or process went away
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Caller gave up
    #[error("Operation cancelled")]
    Cancelled,

    /// No live connection for the requested server
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// A connection for this server is already registered
    #[error("Server already exists: {0}")]
    ServerAlreadyExists(String),

    /// The server is configured but disabled
    #[error("Server is disabled: {0}")]
    ServerDisabled(String),

    /// Configuration store failure
    #[error("Config store error: {0}")]
    Store(String),

    /// Anything else, original message preserved
    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Create a new InvalidRequest error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a new InvalidResponse error
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Create a new AuthenticationFailed error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed(message.into())
    }

    /// Create a new ConnectionClosed error
    pub fn closed(message: impl Into<String>) -> Self {
        Self::ConnectionClosed(message.into())
    }

    /// Create a new Server error
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Map a JSON-RPC error object returned for `method` into the taxonomy
    ///
    /// Inverse of [`McpError::rpc_code`] for the subsystem codes.
    pub fn from_rpc(method: &str, error: McpRpcError) -> Self {
        match error.code {
            codes::METHOD_NOT_FOUND if method == methods::TOOLS_CALL => {
                Self::ToolNotFound(error.message)
            }
            codes::INVALID_PARAMS | codes::INVALID_REQUEST => Self::InvalidRequest(error.message),
            codes::PARSE_ERROR => Self::InvalidResponse(error.message),
            codes::TOOL_EXECUTION => Self::ToolExecution(error.message),
            codes::RESOURCE_ACCESS => Self::ResourceNotFound(error.message),
            codes::CONNECTION => Self::ConnectionClosed(error.message),
            codes::AUTHENTICATION => Self::AuthenticationFailed(error.message),
            // The server does not report how long it waited
            codes::TIMEOUT => Self::Timeout(Duration::ZERO),
            code => Self::Server {
                code,
                message: error.message,
            },
        }
    }

    /// Stable string code for logs and admin display
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "MCP_NOT_CONNECTED",
            Self::AlreadyConnected => "MCP_ALREADY_CONNECTED",
            Self::NotInitialized => "MCP_NOT_INITIALIZED",
            Self::AlreadyInitialized => "MCP_ALREADY_INITIALIZED",
            Self::InvalidTransport(_) => "MCP_INVALID_TRANSPORT",
            Self::InvalidRequest(_) => "MCP_INVALID_REQUEST",
            Self::InvalidResponse(_) => "MCP_INVALID_RESPONSE",
            Self::ToolNotFound(_) => "MCP_TOOL_NOT_FOUND",
            Self::ResourceNotFound(_) => "MCP_RESOURCE_NOT_FOUND",
            Self::ToolExecution(_) => "MCP_TOOL_EXECUTION",
            Self::Timeout(_) => "MCP_TIMEOUT",
            Self::Server { .. } => "MCP_SERVER",
            Self::AuthenticationFailed(_) => "MCP_AUTHENTICATION",
            Self::ConnectionClosed(_) => "MCP_CONNECTION_CLOSED",
            Self::Cancelled => "MCP_CANCELLED",
            Self::ServerNotFound(_) => "MCP_SERVER_NOT_FOUND",
            Self::ServerAlreadyExists(_) => "MCP_SERVER_EXISTS",
            Self::ServerDisabled(_) => "MCP_SERVER_DISABLED",
            Self::Store(_) => "MCP_STORE",
            Self::Internal(_) => "MCP_INTERNAL",
        }
    }

    /// JSON-RPC code equivalent of this error
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Server { code, .. } => *code,
            Self::InvalidResponse(_) => codes::PARSE_ERROR,
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
            Self::ToolNotFound(_) => codes::METHOD_NOT_FOUND,
            Self::ToolExecution(_) => codes::TOOL_EXECUTION,
            Self::ResourceNotFound(_) => codes::RESOURCE_ACCESS,
            Self::NotConnected | Self::AlreadyConnected | Self::ConnectionClosed(_) => {
                codes::CONNECTION
            }
            Self::AuthenticationFailed(_) => codes::AUTHENTICATION,
            Self::Timeout(_) => codes::TIMEOUT,
            _ => codes::INTERNAL_ERROR,
        }
    }

    /// Whether retrying the same operation later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed(_)
                | Self::NotConnected
                | Self::Timeout(_)
                | Self::Server { .. }
        )
    }

    /// Whether the caller gave up, as opposed to the server failing
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Normalize an arbitrary error into the taxonomy
    pub fn normalize(err: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(e) = err.downcast_ref::<McpError>() {
            return e.clone();
        }
        if let Some(e) = err.downcast_ref::<std::io::Error>() {
            return Self::from_io(e);
        }
        if let Some(e) = err.downcast_ref::<serde_json::Error>() {
            return Self::InvalidResponse(e.to_string());
        }
        if let Some(e) = err.downcast_ref::<reqwest::Error>() {
            return Self::from_reqwest(e);
        }
        Self::Internal(err.to_string())
    }

    fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut => Self::Timeout(Duration::ZERO),
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof => Self::ConnectionClosed(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(Duration::ZERO);
        }
        if err.is_decode() {
            return Self::InvalidResponse(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Self::AuthenticationFailed(err.to_string());
            }
            return Self::server(i32::from(status.as_u16()), err.to_string());
        }
        if err.is_connect() || err.is_request() {
            return Self::ConnectionClosed(err.to_string());
        }
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(&err)
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(&err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for McpError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::ConnectionClosed("websocket closed".to_string())
            }
            WsError::Io(e) => Self::from_io(&e),
            WsError::Http(response) => match response.status().as_u16() {
                401 | 403 => Self::AuthenticationFailed(format!(
                    "websocket handshake rejected with status {}",
                    response.status()
                )),
                status => Self::server(
                    i32::from(status),
                    format!("websocket handshake failed with status {}", status),
                ),
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for McpError {
    fn from(err: anyhow::Error) -> Self {
        Self::normalize(err.as_ref())
    }
}
