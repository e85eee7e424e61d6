//! SSE and WebSocket transports against in-process servers

mod common;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{calc_reply, init_tracing};
use futures::future::join_all;
use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response as WsResponse,
};
use tokio_util::sync::CancellationToken;
use toolmux_core::mcp::McpRequest;
use toolmux_core::mcp::transport::{SseTransport, Transport, WebSocketTransport};
use toolmux_core::{
    AuthConfig, ConnectionManager, InMemoryConfigStore, McpError, ServerConfig, ToolBridge,
    TransportKind,
};

/// Later-issued calls are answered sooner so replies arrive out of order
fn reply_delay(message: &Value) -> Duration {
    let a = message["params"]["arguments"]["a"].as_u64().unwrap_or(0);
    Duration::from_millis(40u64.saturating_sub(a * 2))
}

async fn manager_for(config: ServerConfig) -> ConnectionManager {
    let store = Arc::new(InMemoryConfigStore::from_configs([config]));
    let manager = ConnectionManager::new(store);
    assert_eq!(manager.initialize().await.unwrap(), 1);
    manager
}

async fn concurrent_adds(bridge: &ToolBridge, n: i64) {
    let cancel = CancellationToken::new();
    let calls = (0..n).map(|i| {
        let args = json!({"a": i, "b": 100}).to_string();
        let cancel = cancel.clone();
        async move {
            let output = bridge
                .execute_by_qualified_name("calc__add", &args, &cancel)
                .await
                .unwrap();
            (i, output.content)
        }
    });
    for (i, content) in join_all(calls).await {
        assert_eq!(content, (i + 100).to_string());
    }
}

/// Where the SSE server sends replies
#[derive(Clone, Copy)]
enum SseReply {
    /// On the event stream, after a per-call delay
    Stream,
    /// In the POST response body
    Inline,
    /// Nowhere
    Withhold,
}

#[derive(Clone)]
struct SseState {
    events: broadcast::Sender<String>,
    reply: SseReply,
    stream_lifetime: Option<Duration>,
}

async fn sse_events(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(data) => return Some((Ok(Event::default().data(data)), rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    let lifetime = state.stream_lifetime.unwrap_or(Duration::from_secs(3600));
    let stream = stream.take_until(tokio::time::sleep(lifetime));
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_millis(20)))
}

async fn sse_message(State(state): State<SseState>, Json(body): Json<Value>) -> Response {
    let Some(reply) = calc_reply(&body) else {
        return StatusCode::ACCEPTED.into_response();
    };
    match state.reply {
        SseReply::Inline => Json(reply).into_response(),
        SseReply::Withhold => StatusCode::ACCEPTED.into_response(),
        SseReply::Stream => {
            let delay = reply_delay(&body);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = state.events.send(reply.to_string());
            });
            StatusCode::ACCEPTED.into_response()
        }
    }
}

async fn spawn_sse_server(reply: SseReply, stream_lifetime: Option<Duration>) -> SocketAddr {
    let (events, _) = broadcast::channel(256);
    let app = Router::new()
        .route("/sse", get(sse_events))
        .route("/sse/message", post(sse_message))
        .with_state(SseState {
            events,
            reply,
            stream_lifetime,
        });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_sse_replies_on_stream() {
    init_tracing();
    let addr = spawn_sse_server(SseReply::Stream, None).await;
    let config = ServerConfig::sse("calc", format!("http://{}/sse", addr)).with_timeouts(5, 5, 5);
    let manager = manager_for(config).await;

    let conn = manager.get_connection_by_name("calc").await.unwrap();
    assert_eq!(conn.config().transport, TransportKind::Sse);
    assert_eq!(conn.server_info().unwrap().name, "calc-server");

    let bridge = ToolBridge::new(manager.clone());
    concurrent_adds(&bridge, 16).await;

    manager.shutdown().await.unwrap();
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_sse_inline_replies() {
    init_tracing();
    let addr = spawn_sse_server(SseReply::Inline, None).await;
    let config = ServerConfig::sse("calc", format!("http://{}/sse", addr)).with_timeouts(5, 5, 5);
    let manager = manager_for(config).await;

    let output = ToolBridge::new(manager)
        .execute_by_qualified_name("calc__add", r#"{"a":2,"b":3}"#, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(output.content, "5");
}

#[tokio::test]
async fn test_sse_stream_loss_fails_pending_calls() {
    init_tracing();
    let addr = spawn_sse_server(SseReply::Withhold, Some(Duration::from_millis(300))).await;
    let config = ServerConfig::sse("calc", format!("http://{}/sse", addr)).with_timeouts(5, 5, 5);
    let transport = SseTransport::new(&config).unwrap();
    transport.connect().await.unwrap();

    let err = transport
        .request(McpRequest::new("calc-1", "tools/list"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ConnectionClosed(_)), "got {:?}", err);
    assert!(!transport.is_connected());
    assert_eq!(transport.pending_requests(), 0);
}

#[tokio::test]
async fn test_sse_read_timeout_clears_pending() {
    init_tracing();
    let addr = spawn_sse_server(SseReply::Withhold, None).await;
    let config = ServerConfig::sse("calc", format!("http://{}/sse", addr)).with_timeouts(5, 1, 5);
    let transport = SseTransport::new(&config).unwrap();
    transport.connect().await.unwrap();

    let err = transport
        .request(McpRequest::new("calc-1", "tools/list"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Timeout(_)), "got {:?}", err);
    assert_eq!(transport.pending_requests(), 0);
    assert!(transport.is_connected());

    transport.close().await.unwrap();
}

/// WebSocket calc server; a `crash` tool call drops the socket
async fn spawn_ws_server(seen_auth: Arc<Mutex<Option<String>>>, answer_pings: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen_auth = Arc::clone(&seen_auth);
            tokio::spawn(async move {
                let callback = |req: &Request, resp: WsResponse| {
                    *seen_auth.lock() = req
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    Ok::<_, ErrorResponse>(resp)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };
                let (mut sink, mut source) = ws.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                let writer = tokio::spawn(async move {
                    while let Some(text) = rx.recv().await {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                });

                while let Some(Ok(frame)) = source.next().await {
                    let Message::Text(text) = frame else {
                        continue;
                    };
                    let Ok(body) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    if body["params"]["name"] == "crash" {
                        break;
                    }
                    if body["method"] == "ping" && !answer_pings {
                        continue;
                    }
                    if let Some(reply) = calc_reply(&body) {
                        let delay = reply_delay(&body);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = tx.send(reply.to_string());
                        });
                    }
                }
                writer.abort();
            });
        }
    });
    addr
}

fn ws_config(addr: SocketAddr) -> ServerConfig {
    ServerConfig::websocket("calc", format!("ws://{}/ws", addr))
        .with_auth(AuthConfig::bearer("ws-token"))
        .with_timeouts(5, 5, 5)
}

#[tokio::test]
async fn test_websocket_concurrent_calls() {
    init_tracing();
    let seen_auth = Arc::new(Mutex::new(None));
    let addr = spawn_ws_server(Arc::clone(&seen_auth), true).await;
    let manager = manager_for(ws_config(addr)).await;

    assert_eq!(seen_auth.lock().as_deref(), Some("Bearer ws-token"));

    let bridge = ToolBridge::new(manager.clone());
    concurrent_adds(&bridge, 16).await;

    let conn = manager.get_connection_by_name("calc").await.unwrap();
    conn.ping(&CancellationToken::new()).await.unwrap();
    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_websocket_drop_fails_pending_calls() {
    init_tracing();
    let addr = spawn_ws_server(Arc::new(Mutex::new(None)), true).await;
    let manager = manager_for(ws_config(addr)).await;
    let conn = manager.get_connection_by_name("calc").await.unwrap();

    let err = conn
        .call_tool("crash", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::ConnectionClosed(_)), "got {:?}", err);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!conn.is_connected());
    assert!(manager.connected_server_names().await.is_empty());
}

#[tokio::test]
async fn test_websocket_cancelled_call() {
    init_tracing();
    let addr = spawn_ws_server(Arc::new(Mutex::new(None)), true).await;
    let manager = manager_for(ws_config(addr)).await;
    let conn = manager.get_connection_by_name("calc").await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = conn
        .call_tool("add", json!({"a": 1, "b": 1}), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, McpError::Cancelled);
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_websocket_unanswered_keepalive_disconnects() {
    init_tracing();
    let addr = spawn_ws_server(Arc::new(Mutex::new(None)), false).await;
    let config = ws_config(addr).with_timeouts(5, 1, 5).with_heartbeat(1);
    let transport = WebSocketTransport::new(&config).unwrap();
    transport.connect().await.unwrap();
    assert!(transport.is_connected());

    // First keepalive at 1s, unanswered until its 1s deadline
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(!transport.is_connected());
    let err = transport
        .request(McpRequest::new("calc-1", "tools/list"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, McpError::NotConnected);
}
