//! Server configuration store
//!
//! The manager reads server configurations and writes connection status
//! through [`ConfigStore`]. [`InMemoryConfigStore`] backs the CLI and tests;
//! durable storage implements the same trait.

use crate::mcp::error::{McpError, McpResult};
use crate::mcp::server_config::ServerConfig;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Storage of server configurations and their status fields
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// All enabled configurations
    async fn find_enabled(&self) -> McpResult<Vec<ServerConfig>>;

    /// All configurations
    async fn find_all(&self) -> McpResult<Vec<ServerConfig>>;

    /// Configuration by id
    async fn find_by_id(&self, id: i64) -> McpResult<Option<ServerConfig>>;

    /// Configuration by unique name
    async fn find_by_name(&self, name: &str) -> McpResult<Option<ServerConfig>>;

    /// Insert or update; an id of 0 assigns a new one
    async fn save(&self, config: &ServerConfig) -> McpResult<ServerConfig>;

    /// Delete a configuration, returning whether it existed
    async fn delete(&self, id: i64) -> McpResult<bool>;

    /// Stamp a successful connection and clear the last error
    async fn update_connection_success(&self, id: i64) -> McpResult<()>;

    /// Record a connection failure, counting it as an attempt
    async fn update_connection_error(&self, id: i64, error: &str) -> McpResult<()>;

    /// Bump the error counter
    async fn increment_error_count(&self, id: i64) -> McpResult<()>;

    /// Store the last error text without touching counters
    async fn update_last_error(&self, id: i64, error: &str) -> McpResult<()>;

    /// Persist the enabled flag
    async fn update_enabled(&self, id: i64, enabled: bool) -> McpResult<()>;
}

/// Process-local store
#[derive(Debug)]
pub struct InMemoryConfigStore {
    servers: RwLock<BTreeMap<i64, ServerConfig>>,
    next_id: AtomicI64,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self {
            servers: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryConfigStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `configs`
    pub fn from_configs(configs: impl IntoIterator<Item = ServerConfig>) -> Self {
        let store = Self::new();
        for config in configs {
            store.insert(config);
        }
        store
    }

    /// Insert a configuration, assigning an id when it has none
    pub fn insert(&self, mut config: ServerConfig) -> ServerConfig {
        if config.id == 0 {
            config.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        } else {
            self.next_id.fetch_max(config.id + 1, Ordering::SeqCst);
        }
        self.servers.write().insert(config.id, config.clone());
        config
    }

    /// Snapshot of one configuration
    pub fn get(&self, id: i64) -> Option<ServerConfig> {
        self.servers.read().get(&id).cloned()
    }

    fn modify(&self, id: i64, f: impl FnOnce(&mut ServerConfig)) -> McpResult<()> {
        let mut servers = self.servers.write();
        let config = servers
            .get_mut(&id)
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))?;
        f(config);
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn find_enabled(&self) -> McpResult<Vec<ServerConfig>> {
        Ok(self
            .servers
            .read()
            .values()
            .filter(|c| c.enabled)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> McpResult<Vec<ServerConfig>> {
        Ok(self.servers.read().values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> McpResult<Option<ServerConfig>> {
        Ok(self.get(id))
    }

    async fn find_by_name(&self, name: &str) -> McpResult<Option<ServerConfig>> {
        Ok(self
            .servers
            .read()
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn save(&self, config: &ServerConfig) -> McpResult<ServerConfig> {
        let clash = self
            .servers
            .read()
            .values()
            .any(|c| c.name == config.name && c.id != config.id);
        if clash {
            return Err(McpError::ServerAlreadyExists(config.name.clone()));
        }
        Ok(self.insert(config.clone()))
    }

    async fn delete(&self, id: i64) -> McpResult<bool> {
        Ok(self.servers.write().remove(&id).is_some())
    }

    async fn update_connection_success(&self, id: i64) -> McpResult<()> {
        self.modify(id, |c| {
            c.last_connected_at = Some(Utc::now());
            c.connection_count += 1;
            c.last_error = None;
        })
    }

    async fn update_connection_error(&self, id: i64, error: &str) -> McpResult<()> {
        self.modify(id, |c| {
            c.last_error = Some(error.to_string());
            c.connection_count += 1;
            c.error_count += 1;
        })
    }

    async fn increment_error_count(&self, id: i64) -> McpResult<()> {
        self.modify(id, |c| c.error_count += 1)
    }

    async fn update_last_error(&self, id: i64, error: &str) -> McpResult<()> {
        self.modify(id, |c| c.last_error = Some(error.to_string()))
    }

    async fn update_enabled(&self, id: i64, enabled: bool) -> McpResult<()> {
        self.modify(id, |c| c.enabled = enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = InMemoryConfigStore::new();
        let a = store.insert(ServerConfig::http("a", "http://a"));
        let b = store.insert(ServerConfig::http("b", "http://b").with_id(10));
        let c = store.insert(ServerConfig::http("c", "http://c"));

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 10);
        assert_eq!(c.id, 11);
        assert_eq!(store.find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_status_updates() {
        let store = InMemoryConfigStore::new();
        let id = store.insert(ServerConfig::http("a", "http://a")).id;

        store.update_connection_error(id, "refused").await.unwrap();
        store.increment_error_count(id).await.unwrap();
        store.update_last_error(id, "tool failed").await.unwrap();
        let config = store.get(id).unwrap();
        assert_eq!(config.error_count, 2);
        assert_eq!(config.connection_count, 1);
        assert_eq!(config.last_error.as_deref(), Some("tool failed"));

        store.update_connection_success(id).await.unwrap();
        let config = store.get(id).unwrap();
        assert_eq!(config.connection_count, 2);
        assert!(config.last_error.is_none());
        assert!(config.last_connected_at.is_some());
    }

    #[tokio::test]
    async fn test_enabled_filter_and_unknown_id() {
        let store = InMemoryConfigStore::new();
        let id = store.insert(ServerConfig::http("a", "http://a")).id;
        store.insert(ServerConfig::http("b", "http://b").with_enabled(false));

        assert_eq!(store.find_enabled().await.unwrap().len(), 1);
        store.update_enabled(id, false).await.unwrap();
        assert!(store.find_enabled().await.unwrap().is_empty());
        assert!(matches!(
            store.update_enabled(99, true).await,
            Err(McpError::ServerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_name() {
        let store = InMemoryConfigStore::new();
        store.insert(ServerConfig::http("a", "http://a"));
        let err = store.save(&ServerConfig::http("a", "http://other")).await.unwrap_err();
        assert_eq!(err, McpError::ServerAlreadyExists("a".to_string()));
    }
}
