//! Connection to one tool server
//!
//! A [`Connection`] pairs a [`ServerConfig`] with the transport built for it
//! and implements the protocol operations once for every transport variant.
//!
//! # Features
//! - One request path that records statistics for every attempt
//! - Handshake with capability probing
//! - Idempotent disconnect

mod operations;

use super::error::{McpError, McpResult};
use super::protocol::{McpNotification, McpRequest};
use super::server_config::ServerConfig;
use super::stats::ConnectionStats;
use super::transport::{Transport, build_transport};
use super::correlator::RequestIdGenerator;
use super::types::ServerInfo;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Live connection to a tool server
pub struct Connection {
    config: ServerConfig,
    transport: Box<dyn Transport>,
    ids: RequestIdGenerator,
    server_info: RwLock<Option<ServerInfo>>,
    stats: Mutex<ConnectionStats>,
    initialized: AtomicBool,
}

impl Connection {
    /// Create a connection using the transport matching `config.transport`
    pub fn new(config: ServerConfig) -> McpResult<Self> {
        let transport = build_transport(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a connection over an explicit transport
    pub fn with_transport(config: ServerConfig, transport: Box<dyn Transport>) -> Self {
        let ids = RequestIdGenerator::new(config.name.clone());
        Self {
            config,
            transport,
            ids,
            server_info: RwLock::new(None),
            stats: Mutex::new(ConnectionStats::default()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Server name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Server info recorded by `initialize`
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().clone()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ConnectionStats {
        let mut stats = self.stats.lock().clone();
        stats.connected = self.is_connected();
        stats
    }

    /// Clear the statistics counters
    pub fn reset_stats(&self) {
        self.stats.lock().reset();
    }

    /// Whether the transport is open
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether `initialize` has completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Open the transport, bounded by the connect timeout
    #[instrument(skip(self, cancel), fields(server = %self.config.name), level = "debug")]
    pub async fn connect(&self, cancel: &CancellationToken) -> McpResult<()> {
        if self.is_connected() {
            return Err(McpError::AlreadyConnected);
        }
        let timeout = self.config.connect_timeout();
        tokio::select! {
            result = tokio::time::timeout(timeout, self.transport.connect()) => match result {
                Ok(outcome) => outcome?,
                Err(_) => {
                    // The transport may have half-opened before the deadline
                    let _ = self.transport.close().await;
                    return Err(McpError::Timeout(timeout));
                }
            },
            _ = cancel.cancelled() => {
                let _ = self.transport.close().await;
                return Err(McpError::Cancelled);
            }
        }

        self.stats.lock().mark_connected();
        info!(server = %self.config.name, transport = %self.transport.kind(), "connected");
        Ok(())
    }

    /// Close the transport; a closed connection is left as is
    pub async fn disconnect(&self) -> McpResult<()> {
        let was_live = self.is_connected() || self.is_initialized();
        self.initialized.store(false, Ordering::SeqCst);
        self.stats.lock().mark_disconnected();
        if !was_live {
            return Ok(());
        }
        self.transport.close().await?;
        info!(server = %self.config.name, "disconnected");
        Ok(())
    }

    /// Send one request and return its raw result
    pub(crate) async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> McpResult<Value> {
        self.call(method, params, cancel).await
    }

    /// Send a request, decode its result and record the outcome
    ///
    /// Every outward request goes through here so statistics cover all of
    /// them, including replies whose result fails to decode.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> McpResult<T> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        let mut request = McpRequest::new(self.ids.next_id(), method);
        if let Some(params) = params {
            request = request.with_params(params);
        }
        debug!(server = %self.config.name, id = %request.id, method, "sending request");

        let started = Instant::now();
        let outcome = self
            .transport
            .request(request, cancel)
            .await
            .and_then(|response| {
                response
                    .into_result()
                    .map_err(|e| McpError::from_rpc(method, e))
            })
            .and_then(|value| serde_json::from_value(value).map_err(McpError::from));
        self.stats.lock().record(started.elapsed(), outcome.is_ok());
        outcome
    }

    /// Send a notification
    pub(crate) async fn notify(&self, method: &str) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        self.transport.notify(McpNotification::new(method)).await
    }

    fn ensure_initialized(&self) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("server", &self.config.name)
            .field("transport", &self.config.transport)
            .field("connected", &self.is_connected())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
