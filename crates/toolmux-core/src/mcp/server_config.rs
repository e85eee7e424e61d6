//! Tool server configuration

use super::auth::AuthConfig;
use super::error::{McpError, McpResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    30
}

/// Transport used to reach a tool server
///
/// Fixed at creation; changing it requires deleting and recreating the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Child process speaking newline-delimited JSON on stdin/stdout
    Stdio,
    /// One HTTP POST per request
    Http,
    /// Server-Sent Events push stream plus a POST control endpoint
    Sse,
    /// Full-duplex WebSocket
    #[serde(alias = "ws")]
    Websocket,
}

impl TransportKind {
    /// Lowercase wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
            Self::Sse => "sse",
            Self::Websocket => "websocket",
        }
    }

    /// Whether the transport needs a URL rather than a command
    pub fn is_network(self) -> bool {
        !matches!(self, Self::Stdio)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "sse" => Ok(Self::Sse),
            "websocket" | "ws" => Ok(Self::Websocket),
            other => Err(McpError::InvalidTransport(other.to_string())),
        }
    }
}

/// Configuration of one tool server
///
/// Owned by the configuration store; the connection layer only writes the
/// status fields (`last_connected_at`, `last_error`, counters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Store identity (0 until saved)
    #[serde(default)]
    pub id: i64,
    /// Unique server name, used as the tool-name prefix
    pub name: String,
    /// Transport kind
    pub transport: TransportKind,
    /// Whether the manager should connect to this server
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Ordering hint for admin surfaces
    #[serde(default)]
    pub priority: i32,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Command to execute (stdio)
    #[serde(default)]
    pub command: Option<String>,
    /// Command arguments (stdio)
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory (stdio)
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Environment variables (stdio)
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Endpoint URL (http, sse, websocket)
    #[serde(default)]
    pub url: Option<String>,
    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Authentication mode
    #[serde(default)]
    pub auth: AuthConfig,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-request read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Write timeout in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Whether the manager supervises this server with periodic pings
    #[serde(default)]
    pub heartbeat_enabled: bool,
    /// Heartbeat (and WebSocket keepalive) interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Last successful connection
    #[serde(default)]
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last recorded error message
    #[serde(default)]
    pub last_error: Option<String>,
    /// Number of successful connections
    #[serde(default)]
    pub connection_count: u64,
    /// Number of recorded errors
    #[serde(default)]
    pub error_count: u64,
}

impl ServerConfig {
    fn base(name: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            id: 0,
            name: name.into(),
            transport,
            enabled: true,
            priority: 0,
            description: None,
            command: None,
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            auth: AuthConfig::None,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            heartbeat_enabled: false,
            heartbeat_interval_secs: default_heartbeat_interval(),
            last_connected_at: None,
            last_error: None,
            connection_count: 0,
            error_count: 0,
        }
    }

    /// Create a stdio transport config
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        let mut config = Self::base(name, TransportKind::Stdio);
        config.command = Some(command.into());
        config.args = args;
        config
    }

    /// Create an HTTP transport config
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut config = Self::base(name, TransportKind::Http);
        config.url = Some(url.into());
        config
    }

    /// Create an SSE transport config
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut config = Self::base(name, TransportKind::Sse);
        config.url = Some(url.into());
        config
    }

    /// Create a WebSocket transport config
    pub fn websocket(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut config = Self::base(name, TransportKind::Websocket);
        config.url = Some(url.into());
        config
    }

    /// Set the store identity
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Set authentication
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Enable heartbeat supervision at the given interval
    pub fn with_heartbeat(mut self, interval_secs: u64) -> Self {
        self.heartbeat_enabled = true;
        self.heartbeat_interval_secs = interval_secs;
        self
    }

    /// Add HTTP header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set connect/read/write timeouts in seconds
    pub fn with_timeouts(mut self, connect: u64, read: u64, write: u64) -> Self {
        self.connect_timeout_secs = connect;
        self.read_timeout_secs = read;
        self.write_timeout_secs = write;
        self
    }

    /// Set enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Write timeout
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Heartbeat interval, never zero
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Endpoint URL, required for network transports
    pub fn require_url(&self) -> McpResult<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                McpError::invalid_request(format!(
                    "server '{}' uses {} transport but has no url",
                    self.name, self.transport
                ))
            })
    }

    /// Check transport-specific required parameters
    pub fn validate(&self) -> McpResult<()> {
        if self.name.trim().is_empty() {
            return Err(McpError::invalid_request("server name must not be empty"));
        }

        match self.transport {
            TransportKind::Stdio => {
                if self.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    return Err(McpError::invalid_request(format!(
                        "server '{}' uses stdio transport but has no command",
                        self.name
                    )));
                }
            }
            TransportKind::Http | TransportKind::Sse => {
                let url = self.require_url()?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(McpError::InvalidTransport(format!(
                        "{} transport requires an http(s) url, got '{}'",
                        self.transport, url
                    )));
                }
            }
            TransportKind::Websocket => {
                let url = self.require_url()?;
                if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                    return Err(McpError::InvalidTransport(format!(
                        "websocket transport requires a ws(s) url, got '{}'",
                        url
                    )));
                }
            }
        }

        self.auth.validate()
    }
}
