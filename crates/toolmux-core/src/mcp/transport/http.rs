//! HTTP transport
//!
//! Every request is a single POST whose body is the JSON-RPC envelope and
//! whose reply body is the matching response. No correlation table is
//! needed; the reply arrives on the same exchange.

use super::Transport;
use crate::mcp::auth::build_headers;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{McpNotification, McpRequest, McpResponse};
use crate::mcp::server_config::{ServerConfig, TransportKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Request/response transport over HTTP POST
pub struct HttpTransport {
    config: ServerConfig,
    url: String,
    client: RwLock<Option<Client>>,
    connected: AtomicBool,
}

impl HttpTransport {
    /// Create a transport for an HTTP server
    pub fn new(config: &ServerConfig) -> McpResult<Self> {
        let url = config.require_url()?.to_string();
        Ok(Self {
            config: config.clone(),
            url,
            client: RwLock::new(None),
            connected: AtomicBool::new(false),
        })
    }

    fn build_client(&self) -> McpResult<Client> {
        let mut headers = build_headers(&self.config.headers, &self.config.auth)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Client::builder()
            .default_headers(headers)
            .connect_timeout(self.config.connect_timeout())
            .timeout(self.config.read_timeout())
            .build()
            .map_err(|e| McpError::internal(format!("failed to create HTTP client: {}", e)))
    }

    fn client(&self) -> McpResult<Client> {
        self.client.read().clone().ok_or(McpError::NotConnected)
    }

    async fn post(&self, body: &impl serde::Serialize) -> McpResult<reqwest::Response> {
        let response = self.client()?.post(&self.url).json(body).send().await?;
        check_status(response.status())?;
        Ok(response)
    }
}

/// Map a non-success HTTP status into the taxonomy
pub(crate) fn check_status(status: StatusCode) -> McpResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(McpError::auth(format!(
            "server rejected credentials with status {}",
            status
        ))),
        _ => Err(McpError::server(
            i32::from(status.as_u16()),
            format!("HTTP error {}", status),
        )),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.is_connected() {
            return Err(McpError::AlreadyConnected);
        }
        let client = self.build_client()?;
        *self.client.write() = Some(client);
        self.connected.store(true, Ordering::SeqCst);
        debug!(server = %self.config.name, url = %self.url, "http transport ready");
        Ok(())
    }

    async fn request(
        &self,
        request: McpRequest,
        cancel: &CancellationToken,
    ) -> McpResult<McpResponse> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        let exchange = async {
            let response = self.post(&request).await?;
            let body: McpResponse = response.json().await?;
            if body.id != request.id {
                return Err(McpError::invalid_response(format!(
                    "response id {} does not match request id {}",
                    body.id, request.id
                )));
            }
            Ok(body)
        };

        tokio::select! {
            result = exchange => result.map_err(|e| match e {
                McpError::Timeout(_) => McpError::Timeout(self.config.read_timeout()),
                other => other,
            }),
            _ = cancel.cancelled() => Err(McpError::Cancelled),
        }
    }

    async fn notify(&self, notification: McpNotification) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        self.post(&notification).await.map(|_| ())
    }

    async fn close(&self) -> McpResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.client.write().take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}
