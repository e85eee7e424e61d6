//! Connection manager
//!
//! Owns one [`Connection`] per enabled server, keeps their persisted status
//! current, and supervises them with periodic heartbeats.
//!
//! The connection map sits behind one `RwLock` that dispatch and listing
//! hold only long enough to clone the `Arc`s. A separate membership mutex
//! serializes add/remove/reload sequences so a reload never races a removal.

mod dispatch;
mod factory;
mod heartbeat;
mod lifecycle;

pub use factory::{ConnectionFactory, DefaultConnectionFactory};
pub use lifecycle::ConnectionTest;

use super::connection::Connection;
use super::error::{McpError, McpResult};
use super::server_config::ServerConfig;
use super::stats::ConnectionStats;
use crate::store::ConfigStore;
use heartbeat::Supervisor;
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

pub(crate) struct ManagerInner {
    store: Arc<dyn ConfigStore>,
    factory: Arc<dyn ConnectionFactory>,
    connections: RwLock<HashMap<i64, Arc<Connection>>>,
    membership: Mutex<()>,
    supervisors: SyncMutex<HashMap<i64, Supervisor>>,
    shutdown: CancellationToken,
}

/// Manager of all tool-server connections
///
/// Cheap to clone; clones share the same connections.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Create a manager using the default transport factory
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self::with_factory(store, Arc::new(DefaultConnectionFactory))
    }

    /// Create a manager with a custom connection factory
    pub fn with_factory(store: Arc<dyn ConfigStore>, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                factory,
                connections: RwLock::new(HashMap::new()),
                membership: Mutex::new(()),
                supervisors: SyncMutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Configuration store
    pub fn store(&self) -> Arc<dyn ConfigStore> {
        Arc::clone(&self.inner.store)
    }

    /// Configuration by id
    pub async fn get_server_by_id(&self, id: i64) -> McpResult<Option<ServerConfig>> {
        self.inner.store.find_by_id(id).await
    }

    /// All configurations
    pub async fn get_all_servers(&self) -> McpResult<Vec<ServerConfig>> {
        self.inner.store.find_all().await
    }

    /// Enabled configurations
    pub async fn get_enabled_servers(&self) -> McpResult<Vec<ServerConfig>> {
        self.inner.store.find_enabled().await
    }

    /// Registered connection by server id
    pub async fn get_connection(&self, id: i64) -> Option<Arc<Connection>> {
        self.inner.connections.read().await.get(&id).cloned()
    }

    /// Registered connection by server name
    pub async fn get_connection_by_name(&self, name: &str) -> Option<Arc<Connection>> {
        self.inner
            .connections
            .read()
            .await
            .values()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Snapshot of every registered connection
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.inner.connections.read().await.values().cloned().collect()
    }

    /// Statistics of one server
    pub async fn get_server_stats(&self, id: i64) -> McpResult<ConnectionStats> {
        self.get_connection(id)
            .await
            .map(|c| c.stats())
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))
    }

    /// Statistics of every registered server, keyed by name
    pub async fn get_all_stats(&self) -> HashMap<String, ConnectionStats> {
        self.connections()
            .await
            .into_iter()
            .map(|c| (c.name().to_string(), c.stats()))
            .collect()
    }

    /// Number of registered connections that are live
    pub async fn get_active_server_count(&self) -> usize {
        self.inner
            .connections
            .read()
            .await
            .values()
            .filter(|c| c.is_connected())
            .count()
    }

    /// Names of live servers, sorted
    pub async fn connected_server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .connections
            .read()
            .await
            .values()
            .filter(|c| c.is_connected())
            .map(|c| c.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("supervised", &self.inner.supervisors.lock().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
