//! Tool discovery and dispatch across servers

use super::ConnectionManager;
use crate::mcp::connection::Connection;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::types::{CallResult, McpResource, McpTool, ReadResourceParams, ReadResult};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

impl ConnectionManager {
    /// Tools of every live server, keyed by server name
    ///
    /// Servers whose listing fails are skipped with a warning.
    pub async fn get_all_tools(&self, cancel: &CancellationToken) -> HashMap<String, Vec<McpTool>> {
        let connections: Vec<Arc<Connection>> = self
            .connections()
            .await
            .into_iter()
            .filter(|c| c.is_connected())
            .collect();

        let listings = join_all(connections.iter().map(|conn| async move {
            (conn.name().to_string(), conn.list_tools(cancel).await)
        }))
        .await;

        let mut tools = HashMap::new();
        for (name, listing) in listings {
            match listing {
                Ok(list) => {
                    debug!(server = %name, count = list.len(), "listed tools");
                    tools.insert(name, list);
                }
                Err(e) => warn!(server = %name, error = %e, "skipping server, failed to list tools"),
            }
        }
        tools
    }

    /// Tools of one server by name
    pub async fn get_tools_by_server_name(
        &self,
        server: &str,
        cancel: &CancellationToken,
    ) -> McpResult<Vec<McpTool>> {
        let conn = self
            .get_connection_by_name(server)
            .await
            .ok_or_else(|| McpError::ServerNotFound(server.to_string()))?;
        conn.list_tools(cancel).await
    }

    /// Call a tool on the server with `id`
    pub async fn call_tool(
        &self,
        id: i64,
        tool: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> McpResult<CallResult> {
        let conn = self
            .get_connection(id)
            .await
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))?;
        self.forward_call(&conn, tool, arguments, cancel).await
    }

    /// Call a tool on the server named `server`
    pub async fn call_tool_by_name(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> McpResult<CallResult> {
        let conn = self
            .get_connection_by_name(server)
            .await
            .ok_or_else(|| McpError::ServerNotFound(server.to_string()))?;
        self.forward_call(&conn, tool, arguments, cancel).await
    }

    /// Read a resource from the server with `id`
    pub async fn read_resource(
        &self,
        id: i64,
        uri: &str,
        cancel: &CancellationToken,
    ) -> McpResult<ReadResult> {
        let conn = self
            .get_connection(id)
            .await
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))?;
        conn.read_resource(ReadResourceParams::new(uri), cancel).await
    }

    /// List resources of the server with `id`
    pub async fn list_resources(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> McpResult<Vec<McpResource>> {
        let conn = self
            .get_connection(id)
            .await
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))?;
        conn.list_resources(cancel).await
    }

    async fn forward_call(
        &self,
        conn: &Connection,
        tool: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> McpResult<CallResult> {
        let id = conn.config().id;
        match conn.call_tool(tool, arguments, cancel).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(server = %conn.name(), tool, error = %e, "tool call failed");
                let store = &self.inner.store;
                if let Err(store_err) = store.increment_error_count(id).await {
                    debug!(server = %conn.name(), error = %store_err, "failed to persist error count");
                }
                if let Err(store_err) = store.update_last_error(id, &e.to_string()).await {
                    debug!(server = %conn.name(), error = %store_err, "failed to persist last error");
                }
                Err(e)
            }
        }
    }
}
