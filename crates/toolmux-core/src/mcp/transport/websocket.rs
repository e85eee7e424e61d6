//! WebSocket transport
//!
//! Requests and responses travel as text frames on one full-duplex socket.
//! A reader task routes inbound frames through the correlator and a
//! keepalive task sends a protocol `ping` every heartbeat interval; a failed
//! keepalive tears the connection down.

use super::Transport;
use crate::mcp::correlator::{Correlator, RequestIdGenerator};
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{McpMessage, McpNotification, McpRequest, McpResponse, methods};
use crate::mcp::server_config::{ServerConfig, TransportKind};
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// State shared between the transport and its background tasks
struct Shared {
    server: String,
    sink: Mutex<Option<WsSink>>,
    correlator: Correlator,
    connected: AtomicBool,
    write_timeout: Duration,
}

impl Shared {
    async fn send_text(&self, text: String) -> McpResult<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(McpError::NotConnected)?;
        match tokio::time::timeout(self.write_timeout, sink.send(Message::Text(text))).await {
            Ok(result) => result.map_err(McpError::from),
            Err(_) => Err(McpError::Timeout(self.write_timeout)),
        }
    }

    async fn send<T: serde::Serialize>(&self, message: &T) -> McpResult<()> {
        self.send_text(serde_json::to_string(message)?).await
    }

    async fn mark_lost(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        self.correlator.fail_all(McpError::closed(reason.to_string()));
    }
}

/// Full-duplex WebSocket transport
pub struct WebSocketTransport {
    config: ServerConfig,
    shared: Arc<Shared>,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Create a transport for a WebSocket server; nothing is opened yet
    pub fn new(config: &ServerConfig) -> McpResult<Self> {
        config.require_url()?;
        Ok(Self {
            config: config.clone(),
            shared: Arc::new(Shared {
                server: config.name.clone(),
                sink: Mutex::new(None),
                correlator: Correlator::new(),
                connected: AtomicBool::new(false),
                write_timeout: config.write_timeout(),
            }),
            tasks: SyncMutex::new(Vec::new()),
        })
    }

    fn handshake_request(
        &self,
    ) -> McpResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let url = self.config.require_url()?;
        let mut request = url
            .into_client_request()
            .map_err(|e| McpError::invalid_request(format!("invalid websocket url: {}", e)))?;

        let auth = self.config.auth.header()?;
        let headers = self
            .config
            .headers
            .iter()
            .chain(auth.as_ref().map(|(n, v)| (n, v)));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::invalid_request(format!("invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| McpError::invalid_request(format!("invalid header value: {}", e)))?;
            request.headers_mut().insert(name, value);
        }
        Ok(request)
    }
}

async fn read_loop(shared: Arc<Shared>, mut stream: futures::stream::SplitStream<WsStream>) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<McpMessage>(&text) {
                Ok(message) => {
                    shared.correlator.dispatch(message);
                }
                Err(e) => debug!(server = %shared.server, error = %e, "skipping non-protocol frame"),
            },
            Some(Ok(Message::Binary(bytes))) => {
                if let Ok(message) = serde_json::from_slice::<McpMessage>(&bytes) {
                    shared.correlator.dispatch(message);
                }
            }
            // tungstenite queues the pong reply itself
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                info!(server = %shared.server, ?frame, "websocket closed by server");
                break "websocket closed by server";
            }
            Some(Err(e)) => {
                warn!(server = %shared.server, error = %e, "websocket read failed");
                break "websocket read failed";
            }
            None => break "websocket stream ended",
        }
    };
    shared.mark_lost(reason).await;
}

async fn keepalive_loop(shared: Arc<Shared>, interval: Duration, probe_timeout: Duration) {
    let ids = RequestIdGenerator::new(format!("{}-keepalive", shared.server));
    let never = CancellationToken::new();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.connected.load(Ordering::SeqCst) {
            break;
        }
        let request = McpRequest::new(ids.next_id(), methods::PING);
        let probe = async {
            let slot = shared.correlator.register(&request.id)?;
            shared.send(&request).await?;
            slot.wait(probe_timeout, &never).await
        };
        if let Err(e) = probe.await {
            warn!(server = %shared.server, error = %e, "websocket keepalive failed, disconnecting");
            shared.mark_lost("keepalive failed").await;
            break;
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> McpResult<()> {
        if self.is_connected() {
            return Err(McpError::AlreadyConnected);
        }
        let request = self.handshake_request()?;
        let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
        let (sink, stream) = ws.split();

        *self.shared.sink.lock().await = Some(sink);
        self.shared.connected.store(true, Ordering::SeqCst);

        let interval = self.config.heartbeat_interval();
        let probe_timeout = self.config.read_timeout().min(interval);
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        tasks.push(tokio::spawn(read_loop(Arc::clone(&self.shared), stream)));
        tasks.push(tokio::spawn(keepalive_loop(
            Arc::clone(&self.shared),
            interval,
            probe_timeout,
        )));
        debug!(server = %self.config.name, "websocket open");
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
        let slot = self.shared.correlator.register(&request.id)?;
        self.shared.send(&request).await?;
        slot.wait(self.config.read_timeout(), cancel).await
    }

    async fn notify(&self, notification: McpNotification) -> McpResult<()> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        self.shared.send(&notification).await
    }

    async fn close(&self) -> McpResult<()> {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.shared.mark_lost("connection closed").await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }
}
