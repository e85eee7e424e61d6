//! In-memory tool servers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolmux_core::mcp::protocol::{McpNotification, McpRequest, McpResponse, McpRpcError};
use toolmux_core::mcp::{CallResult, McpTool, Transport};
use toolmux_core::{
    Connection, ConnectionFactory, McpError, McpResult, ServerConfig, TransportKind,
};

/// Tool handler: `(tool name, arguments) -> result`
pub type ToolHandler = Arc<dyn Fn(&str, &Value) -> CallResult + Send + Sync>;

/// Behavior of one fake server
#[derive(Clone)]
pub struct FakeServer {
    pub tools: Vec<McpTool>,
    pub handler: ToolHandler,
    pub fail_connect: bool,
    pub fail_ping: bool,
    pub connect_delay: Duration,
}

impl FakeServer {
    pub fn new(tools: Vec<McpTool>) -> Self {
        Self {
            tools,
            handler: Arc::new(|name, _| CallResult::text(format!("called {}", name))),
            fail_connect: false,
            fail_ping: false,
            connect_delay: Duration::ZERO,
        }
    }

    pub fn with_handler(
        mut self,
        handler: impl Fn(&str, &Value) -> CallResult + Send + Sync + 'static,
    ) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_ping(mut self) -> Self {
        self.fail_ping = true;
        self
    }

    pub fn slow_connect(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }
}

/// Transport answering from a [`FakeServer`]
pub struct FakeTransport {
    server: FakeServer,
    connected: AtomicBool,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeTransport {
    fn respond(&self, request: &McpRequest) -> McpResponse {
        let id = request.id.clone();
        let params = request.params.clone().unwrap_or(Value::Null);
        match request.method.as_str() {
            "initialize" => McpResponse::success(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake", "version": "1.0.0"}
                }),
            ),
            "tools/list" => McpResponse::success(id, json!({ "tools": self.server.tools })),
            "tools/call" => {
                let name = params["name"].as_str().unwrap_or_default().to_string();
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                if !self.server.tools.iter().any(|t| t.name == name) {
                    return McpResponse::error(
                        id,
                        McpRpcError::new(-32601, format!("unknown tool {}", name)),
                    );
                }
                self.calls.lock().push((name.clone(), arguments.clone()));
                let result = (self.server.handler)(&name, &arguments);
                McpResponse::success(id, json!(result))
            }
            "ping" => McpResponse::success(id, json!({})),
            other => McpResponse::error(
                id,
                McpRpcError::new(-32601, format!("method not found: {}", other)),
            ),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> McpResult<()> {
        if !self.server.connect_delay.is_zero() {
            tokio::time::sleep(self.server.connect_delay).await;
        }
        if self.server.fail_connect {
            return Err(McpError::closed("connection refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn request(
        &self,
        request: McpRequest,
        _cancel: &CancellationToken,
    ) -> McpResult<McpResponse> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        if request.method == "ping" && self.server.fail_ping {
            return Err(McpError::Timeout(Duration::from_secs(1)));
        }
        Ok(self.respond(&request))
    }

    async fn notify(&self, _notification: McpNotification) -> McpResult<()> {
        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}

/// Factory creating [`FakeTransport`] connections by server name
#[derive(Default)]
pub struct FakeFactory {
    servers: Mutex<HashMap<String, FakeServer>>,
    created: Mutex<HashMap<String, usize>>,
    total_created: AtomicUsize,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, name: &str, server: FakeServer) {
        self.servers.lock().insert(name.to_string(), server);
    }

    /// Connections created for `name` so far
    pub fn created(&self, name: &str) -> usize {
        self.created.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.total_created.load(Ordering::SeqCst)
    }
}

impl ConnectionFactory for FakeFactory {
    fn create(&self, config: &ServerConfig) -> McpResult<Connection> {
        let server = self
            .servers
            .lock()
            .get(&config.name)
            .cloned()
            .ok_or_else(|| McpError::internal(format!("no fake server {}", config.name)))?;
        *self.created.lock().entry(config.name.clone()).or_default() += 1;
        self.total_created.fetch_add(1, Ordering::SeqCst);

        let transport = FakeTransport {
            server,
            connected: AtomicBool::new(false),
            calls: Arc::clone(&self.calls),
        };
        Ok(Connection::with_transport(config.clone(), Box::new(transport)))
    }
}

/// Tool with an object schema of the given properties
pub fn tool(name: &str, description: &str, properties: Value) -> McpTool {
    McpTool::new(name)
        .with_description(description)
        .with_input_schema(json!({"type": "object", "properties": properties}))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("toolmux_core=debug")
        .with_test_writer()
        .try_init();
}

/// Reply of an in-process `calc` server to one JSON-RPC message;
/// `None` for notifications
pub fn calc_reply(message: &Value) -> Option<Value> {
    let id = message.get("id")?.clone();
    let params = message.get("params").cloned().unwrap_or(Value::Null);
    let reply = match message["method"].as_str().unwrap_or_default() {
        "initialize" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "calc-server", "version": "0.1.0"}
            }
        }),
        "tools/list" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {"tools": [{
                "name": "add",
                "description": "Add two integers",
                "inputSchema": {
                    "type": "object",
                    "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                    "required": ["a", "b"]
                }
            }]}
        }),
        "tools/call" if params["name"] == "add" => {
            let sum = params["arguments"]["a"].as_i64().unwrap_or(0)
                + params["arguments"]["b"].as_i64().unwrap_or(0);
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"content": [{"type": "text", "text": sum.to_string()}]}
            })
        }
        "ping" => json!({"jsonrpc": "2.0", "id": id, "result": {}}),
        other => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("method not found: {}", other)}
        }),
    };
    Some(reply)
}
