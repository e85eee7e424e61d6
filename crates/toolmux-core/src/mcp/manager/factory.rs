//! Connection construction

use crate::mcp::connection::Connection;
use crate::mcp::error::McpResult;
use crate::mcp::server_config::ServerConfig;

/// Builds a connection for a configuration
pub trait ConnectionFactory: Send + Sync {
    /// Create an unconnected connection for `config`
    fn create(&self, config: &ServerConfig) -> McpResult<Connection>;
}

/// Factory that picks the transport from `config.transport`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnectionFactory;

impl ConnectionFactory for DefaultConnectionFactory {
    fn create(&self, config: &ServerConfig) -> McpResult<Connection> {
        Connection::new(config.clone())
    }
}
