//! Server-Sent Events transport
//!
//! Responses arrive on one long-lived `text/event-stream` GET; requests are
//! POSTed to a control endpoint. The control endpoint defaults to
//! `<stream-url>/message` and follows any `endpoint` event the server sends.

use super::Transport;
use super::http::check_status;
use crate::mcp::auth::build_headers;
use crate::mcp::correlator::Correlator;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{McpMessage, McpNotification, McpRequest, McpResponse};
use crate::mcp::server_config::{ServerConfig, TransportKind};
use crate::mcp::sse::SseDecoder;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Url};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Push-stream transport
pub struct SseTransport {
    config: ServerConfig,
    stream_url: Url,
    control_url: Arc<RwLock<Url>>,
    client: RwLock<Option<Client>>,
    correlator: Correlator,
    connected: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    /// Create a transport for an SSE server; nothing is opened yet
    pub fn new(config: &ServerConfig) -> McpResult<Self> {
        let stream_url = Url::parse(config.require_url()?)
            .map_err(|e| McpError::invalid_request(format!("invalid stream url: {}", e)))?;
        let control_url = default_control_url(&stream_url)?;
        Ok(Self {
            config: config.clone(),
            stream_url,
            control_url: Arc::new(RwLock::new(control_url)),
            client: RwLock::new(None),
            correlator: Correlator::new(),
            connected: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        })
    }

    /// Current control endpoint
    pub fn control_url(&self) -> Url {
        self.control_url.read().clone()
    }

    /// Requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    fn client(&self) -> McpResult<Client> {
        self.client.read().clone().ok_or(McpError::NotConnected)
    }

    /// POST one message to the control endpoint and return any inline reply
    async fn post(&self, body: &impl serde::Serialize) -> McpResult<Option<McpResponse>> {
        let url = self.control_url();
        let response = self
            .client()?
            .post(url)
            .timeout(self.config.write_timeout())
            .json(body)
            .send()
            .await?;
        check_status(response.status())?;

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice::<McpResponse>(&bytes).ok())
    }
}

fn default_control_url(stream_url: &Url) -> McpResult<Url> {
    let base = stream_url.as_str().trim_end_matches('/');
    Url::parse(&format!("{}/message", base))
        .map_err(|e| McpError::invalid_request(format!("invalid control url: {}", e)))
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.is_connected() {
            return Err(McpError::AlreadyConnected);
        }
        let headers = build_headers(&self.config.headers, &self.config.auth)?;
        // No overall timeout: the stream stays open for the connection's lifetime
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(self.config.connect_timeout())
            .build()
            .map_err(|e| McpError::internal(format!("failed to create HTTP client: {}", e)))?;

        let response = client
            .get(self.stream_url.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .send()
            .await?;
        check_status(response.status())?;

        let server = self.config.name.clone();
        let stream_url = self.stream_url.clone();
        let control_url = Arc::clone(&self.control_url);
        let correlator = self.correlator.clone();
        let connected = Arc::clone(&self.connected);
        let mut stream = response.bytes_stream();

        let reader = tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            loop {
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        for event in decoder.feed(&chunk) {
                            if event.is_endpoint() {
                                match stream_url.join(event.data.trim()) {
                                    Ok(url) => {
                                        debug!(server = %server, endpoint = %url, "control endpoint announced");
                                        *control_url.write() = url;
                                    }
                                    Err(e) => warn!(server = %server, error = %e, "ignoring invalid endpoint event"),
                                }
                                continue;
                            }
                            match serde_json::from_str::<McpMessage>(&event.data) {
                                Ok(message) => {
                                    correlator.dispatch(message);
                                }
                                Err(e) => debug!(server = %server, error = %e, "skipping non-protocol event"),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(server = %server, error = %e, "event stream failed");
                        break;
                    }
                    None => {
                        info!(server = %server, "event stream ended");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            correlator.fail_all(McpError::closed("event stream ended"));
        });

        *self.client.write() = Some(client);
        if let Some(previous) = self.reader.lock().replace(reader) {
            previous.abort();
        }
        self.connected.store(true, Ordering::SeqCst);
        debug!(server = %self.config.name, url = %self.stream_url, "event stream open");
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
        let slot = self.correlator.register(&request.id)?;

        let posted = tokio::select! {
            result = self.post(&request) => result?,
            _ = cancel.cancelled() => return Err(McpError::Cancelled),
        };
        // Some servers answer inline instead of on the stream
        if let Some(inline) = posted.filter(|r| r.id == request.id) {
            self.correlator.fulfill(inline);
        }

        slot.wait(self.config.read_timeout(), cancel).await
    }

    async fn notify(&self, notification: McpNotification) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        self.post(&notification).await.map(|_| ())
    }

    async fn close(&self) -> McpResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.client.write().take();
        self.correlator.fail_all(McpError::closed("connection closed"));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }
}
