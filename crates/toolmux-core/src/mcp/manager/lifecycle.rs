//! Membership and lifecycle: initialize, add, remove, reload, shutdown

use super::ConnectionManager;
use crate::mcp::connection::Connection;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::server_config::ServerConfig;
use crate::mcp::types::{McpTool, ServerInfo};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome of an ephemeral connection test
#[derive(Debug, Clone)]
pub struct ConnectionTest {
    /// Server info from the handshake
    pub server_info: ServerInfo,
    /// Tools the server offers
    pub tools: Vec<McpTool>,
    /// Time from connect to tool listing
    pub elapsed: Duration,
}

impl ConnectionManager {
    /// Connect every enabled server
    ///
    /// Individual failures are persisted and skipped; returns how many
    /// servers came up.
    pub async fn initialize(&self) -> McpResult<usize> {
        let configs = self.inner.store.find_enabled().await?;
        let total = configs.len();
        let _membership = self.inner.membership.lock().await;

        let mut connected = 0;
        for config in configs {
            let (id, name) = (config.id, config.name.clone());
            match self.connect_server(config).await {
                Ok(()) => connected += 1,
                Err(e) => {
                    error!(server = %name, id, error = %e, "failed to connect server");
                    if let Err(store_err) = self.inner.store.update_connection_error(id, &e.to_string()).await {
                        warn!(server = %name, error = %store_err, "failed to persist connection error");
                    }
                }
            }
        }

        info!(connected, total, "connection manager initialized");
        Ok(connected)
    }

    /// Connect and register a server
    pub async fn add_server(&self, config: ServerConfig) -> McpResult<()> {
        let _membership = self.inner.membership.lock().await;
        self.connect_server(config).await
    }

    /// Stop supervision, disconnect and unregister a server
    pub async fn remove_server(&self, id: i64) -> McpResult<()> {
        let _membership = self.inner.membership.lock().await;
        self.stop_supervisor(id);
        self.disconnect_server(id).await
    }

    /// Tear a server down and bring it back from its stored configuration
    pub async fn reload_server(&self, id: i64) -> McpResult<()> {
        let _membership = self.inner.membership.lock().await;
        self.reload_locked(id).await
    }

    /// Persist the enabled flag and connect the server
    pub async fn enable_server(&self, id: i64) -> McpResult<()> {
        self.inner.store.update_enabled(id, true).await?;
        let config = self.require_config(id).await?;

        let _membership = self.inner.membership.lock().await;
        if self.inner.connections.read().await.contains_key(&id) {
            return Ok(());
        }
        self.connect_server(config).await
    }

    /// Persist the enabled flag and disconnect the server
    pub async fn disable_server(&self, id: i64) -> McpResult<()> {
        self.inner.store.update_enabled(id, false).await?;

        let _membership = self.inner.membership.lock().await;
        self.stop_supervisor(id);
        match self.disconnect_server(id).await {
            Ok(()) | Err(McpError::ServerNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Persist a changed configuration and apply it
    ///
    /// The transport kind is fixed; changing it requires delete and recreate.
    pub async fn update_server(&self, config: ServerConfig) -> McpResult<ServerConfig> {
        let existing = self.require_config(config.id).await?;
        if existing.transport != config.transport {
            return Err(McpError::InvalidTransport(format!(
                "cannot change transport of '{}' from {} to {}",
                existing.name, existing.transport, config.transport
            )));
        }
        config.validate()?;
        let saved = self.inner.store.save(&config).await?;

        let _membership = self.inner.membership.lock().await;
        if saved.enabled {
            self.reload_locked(saved.id).await?;
        } else {
            self.stop_supervisor(saved.id);
            match self.disconnect_server(saved.id).await {
                Ok(()) | Err(McpError::ServerNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(saved)
    }

    /// Connect, initialize and list tools without registering anything
    pub async fn test_server_connection(&self, config: &ServerConfig) -> McpResult<ConnectionTest> {
        config.validate()?;
        let started = Instant::now();
        let conn = self.inner.factory.create(config)?;
        let cancel = self.inner.shutdown.child_token();

        let outcome = async {
            let server_info = self.bring_up(&conn).await?;
            let tools = conn.list_tools(&cancel).await?;
            Ok::<_, McpError>(ConnectionTest {
                server_info,
                tools,
                elapsed: started.elapsed(),
            })
        }
        .await;

        if let Err(e) = conn.disconnect().await {
            debug!(server = %config.name, error = %e, "disconnect after test failed");
        }
        outcome
    }

    /// Cancel supervision and disconnect everything
    pub async fn shutdown(&self) -> McpResult<()> {
        self.inner.shutdown.cancel();
        for (_, supervisor) in self.inner.supervisors.lock().drain() {
            supervisor.cancel();
        }

        let _membership = self.inner.membership.lock().await;
        let connections: Vec<_> = self.inner.connections.write().await.drain().collect();

        let mut failures = Vec::new();
        for (id, conn) in connections {
            if let Err(e) = conn.disconnect().await {
                warn!(server = %conn.name(), id, error = %e, "error disconnecting during shutdown");
                failures.push(format!("{}: {}", conn.name(), e));
            }
        }

        info!("connection manager shut down");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(McpError::internal(failures.join("; ")))
        }
    }

    /// Caller must hold the membership lock
    pub(super) async fn connect_server(&self, config: ServerConfig) -> McpResult<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(McpError::closed("connection manager is shut down"));
        }
        if !config.enabled {
            return Err(McpError::ServerDisabled(config.name));
        }
        {
            let connections = self.inner.connections.read().await;
            if connections.contains_key(&config.id)
                || connections.values().any(|c| c.name() == config.name)
            {
                return Err(McpError::ServerAlreadyExists(config.name));
            }
        }
        config.validate()?;

        let conn = Arc::new(self.inner.factory.create(&config)?);
        self.bring_up(&conn).await?;

        self.inner
            .connections
            .write()
            .await
            .insert(config.id, Arc::clone(&conn));
        if let Err(e) = self.inner.store.update_connection_success(config.id).await {
            warn!(server = %config.name, error = %e, "failed to persist connection success");
        }

        if config.heartbeat_enabled {
            self.ensure_supervisor(&config);
        } else {
            self.stop_supervisor(config.id);
        }
        info!(server = %config.name, id = config.id, transport = %config.transport, "server added");
        Ok(())
    }

    /// Caller must hold the membership lock
    pub(super) async fn disconnect_server(&self, id: i64) -> McpResult<()> {
        let conn = self
            .inner
            .connections
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))?;

        if let Err(e) = conn.disconnect().await {
            warn!(server = %conn.name(), error = %e, "error while disconnecting");
        }
        info!(server = %conn.name(), id, "server removed");
        Ok(())
    }

    /// Caller must hold the membership lock
    pub(super) async fn reload_locked(&self, id: i64) -> McpResult<()> {
        match self.disconnect_server(id).await {
            Ok(()) | Err(McpError::ServerNotFound(_)) => {}
            Err(e) => warn!(id, error = %e, "error removing server before reload"),
        }
        let config = self.require_config(id).await?;
        if !config.enabled {
            self.stop_supervisor(id);
            return Err(McpError::ServerDisabled(config.name));
        }
        self.connect_server(config).await
    }

    /// Connect and initialize within the connect timeout, closing on failure
    async fn bring_up(&self, conn: &Connection) -> McpResult<ServerInfo> {
        let timeout = conn.config().connect_timeout();
        let cancel = self.inner.shutdown.child_token();
        let handshake = async {
            conn.connect(&cancel).await?;
            conn.initialize(&cancel).await
        };

        let outcome = match tokio::time::timeout(timeout, handshake).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(timeout)),
        };
        if outcome.is_err() {
            if let Err(e) = conn.disconnect().await {
                debug!(server = %conn.name(), error = %e, "cleanup after failed connect");
            }
        }
        outcome
    }

    async fn require_config(&self, id: i64) -> McpResult<ServerConfig> {
        self.inner
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))
    }
}
