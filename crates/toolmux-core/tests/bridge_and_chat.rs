//! Tool bridge and chat-tool loop against fake servers

mod common;

use async_trait::async_trait;
use common::{FakeFactory, FakeServer, init_tracing, tool};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolmux_core::chat::{MessageRole, ToolCall};
use toolmux_core::mcp::{CallResult, McpContent};
use toolmux_core::{
    ChatError, ChatMessage, ChatModel, ChatOrchestrator, ChatRequest, ChatResponse,
    ConnectionManager, InMemoryConfigStore, McpError, ServerConfig, Settings, ToolBridge,
};

async fn bridge_with(servers: Vec<(&str, FakeServer)>) -> (ToolBridge, Arc<FakeFactory>) {
    init_tracing();
    let factory = FakeFactory::new();
    let store = Arc::new(InMemoryConfigStore::new());
    for (name, server) in servers {
        store.insert(ServerConfig::http(name, format!("http://{}.local/rpc", name)));
        factory.register(name, server);
    }
    let manager = ConnectionManager::with_factory(store, factory.clone());
    manager.initialize().await.unwrap();
    (ToolBridge::new(manager), factory)
}

fn web_server() -> FakeServer {
    FakeServer::new(vec![tool(
        "search",
        "Search the web",
        json!({"q": {"type": "string", "description": "Query"}}),
    )])
    .with_handler(|_, args| CallResult::text(format!("results for {}", args["q"].as_str().unwrap_or(""))))
}

fn calc_server() -> FakeServer {
    FakeServer::new(vec![tool(
        "add",
        "Add two numbers",
        json!({"a": {"type": "number"}, "b": {"type": "number"}}),
    )])
    .with_handler(|_, args| {
        let sum = args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0);
        CallResult::text(sum.to_string())
    })
}

/// Model replaying scripted responses and recording every request
struct ScriptedModel {
    responses: Mutex<VecDeque<ChatResponse>>,
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn always(response: ChatResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(vec![])
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(
        &self,
        request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatResponse, ChatError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| ChatError::model("script exhausted"))
    }
}

fn tool_call_response(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        message: ChatMessage::assistant_with_tools("", calls),
        finish_reason: Some("tool_calls".to_string()),
    }
}

#[tokio::test]
async fn test_calc_add_formats_result() {
    let (bridge, _) = bridge_with(vec![("calc", calc_server())]).await;

    let output = bridge
        .execute_by_qualified_name("calc__add", r#"{"a":2,"b":3}"#, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(output.content, "5");
    assert!(!output.return_direct);
}

#[tokio::test]
async fn test_openai_tools_are_namespaced() {
    let (bridge, _) = bridge_with(vec![("web", web_server()), ("calc", calc_server())]).await;

    let tools = bridge.to_openai_tools(&CancellationToken::new()).await;
    let names: Vec<&str> = tools.iter().map(|t| t.function.name.as_str()).collect();
    assert_eq!(names, vec!["calc__add", "web__search"]);

    let search = &tools[1];
    assert_eq!(search.tool_type, "function");
    assert_eq!(search.function.description, "Search the web");
    assert_eq!(search.function.parameters["type"], "object");
    assert_eq!(search.function.parameters["properties"]["q"]["type"], "string");
}

#[tokio::test]
async fn test_longest_server_prefix_wins() {
    let a = FakeServer::new(vec![tool("b__c", "", json!({}))])
        .with_handler(|_, _| CallResult::text("from a"));
    let ab = FakeServer::new(vec![tool("c", "", json!({}))])
        .with_handler(|_, _| CallResult::text("from a__b"));
    let (bridge, _) = bridge_with(vec![("a", a), ("a__b", ab)]).await;

    let output = bridge
        .execute_by_qualified_name("a__b__c", "", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(output.content, "from a__b");
}

#[tokio::test]
async fn test_unknown_server_and_bad_arguments() {
    let (bridge, factory) = bridge_with(vec![("calc", calc_server())]).await;
    let cancel = CancellationToken::new();

    assert!(matches!(
        bridge.execute_by_qualified_name("nope__add", "{}", &cancel).await,
        Err(McpError::ToolNotFound(_))
    ));
    assert!(matches!(
        bridge.execute_by_qualified_name("calc__add", "[1]", &cancel).await,
        Err(McpError::InvalidRequest(_))
    ));
    assert!(factory.calls.lock().is_empty());

    bridge
        .execute_by_qualified_name("calc__add", "", &cancel)
        .await
        .unwrap();
    assert_eq!(factory.calls.lock()[0], ("add".to_string(), json!({})));
}

#[tokio::test]
async fn test_tool_error_result_becomes_error() {
    let failing = FakeServer::new(vec![tool("boom", "", json!({}))]).with_handler(|_, _| CallResult {
        content: vec![McpContent::text("disk full")],
        is_error: true,
        meta: None,
    });
    let (bridge, _) = bridge_with(vec![("fs", failing)]).await;

    let err = bridge
        .execute_by_qualified_name("fs__boom", "{}", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, McpError::ToolExecution("disk full".to_string()));
}

#[tokio::test]
async fn test_augmented_prompt_lists_tools() {
    let (bridge, _) = bridge_with(vec![("web", web_server())]).await;
    let prompt = bridge
        .build_augmented_system_prompt("You are helpful.", &CancellationToken::new())
        .await;
    assert!(prompt.starts_with("You are helpful."));
    assert!(prompt.contains("web__search: Search the web"));
}

#[tokio::test]
async fn test_chat_round_trip_through_tool() {
    let (bridge, factory) = bridge_with(vec![("web", web_server())]).await;
    let model = ScriptedModel::new(vec![
        tool_call_response(vec![ToolCall::new("call_1", "web__search", r#"{"q":"rust"}"#)]),
        ChatResponse::stop(ChatMessage::assistant("Rust is a language.")),
    ]);

    let request = ChatRequest::new(
        "test-model",
        vec![ChatMessage::system("You are helpful."), ChatMessage::user("what is rust?")],
    );
    let response = ChatOrchestrator::new(bridge)
        .run(&model, request, 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.message.content, "Rust is a language.");
    assert_eq!(model.calls(), 2);
    assert_eq!(factory.calls.lock()[0], ("search".to_string(), json!({"q": "rust"})));

    let requests = model.requests.lock();
    assert_eq!(requests[0].tools.len(), 1);
    assert!(requests[0].messages[0].content.contains("web__search"));

    let followup = &requests[1].messages;
    assert_eq!(followup.len(), 4);
    assert_eq!(followup[2].role, MessageRole::Assistant);
    assert_eq!(followup[2].requested_tool_calls()[0].id, "call_1");
    assert_eq!(followup[3].role, MessageRole::Tool);
    assert_eq!(followup[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(followup[3].content, "results for rust");
}

#[tokio::test]
async fn test_chat_stops_at_iteration_budget() {
    let (bridge, factory) = bridge_with(vec![("web", web_server())]).await;
    let model = ScriptedModel::always(tool_call_response(vec![ToolCall::new(
        "call_n",
        "web__search",
        r#"{"q":"again"}"#,
    )]));

    let response = ChatOrchestrator::new(bridge)
        .run(&model, ChatRequest::new("m", vec![ChatMessage::user("loop")]), 3, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(model.calls(), 3);
    assert_eq!(factory.calls.lock().len(), 3);
    assert_eq!(response.message.role, MessageRole::Assistant);
    assert_eq!(response.message.requested_tool_calls()[0].id, "call_n");
}

#[tokio::test]
async fn test_chat_default_budget_for_non_positive() {
    let (bridge, _) = bridge_with(vec![("web", web_server())]).await;
    let model = ScriptedModel::always(tool_call_response(vec![ToolCall::new(
        "call_n",
        "web__search",
        "{}",
    )]));

    ChatOrchestrator::new(bridge)
        .run(&model, ChatRequest::new("m", vec![ChatMessage::user("loop")]), -1, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(model.calls(), 5);
}

#[tokio::test]
async fn test_chat_budget_from_settings() {
    let (bridge, _) = bridge_with(vec![("web", web_server())]).await;
    let settings = Settings::from_toml_str("[manager]\nmax_tool_iterations = 2\n").unwrap();
    let model = ScriptedModel::always(tool_call_response(vec![ToolCall::new(
        "call_n",
        "web__search",
        "{}",
    )]));

    settings
        .chat_orchestrator(bridge)
        .run(&model, ChatRequest::new("m", vec![ChatMessage::user("loop")]), 0, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_chat_lists_tools_once_per_turn() {
    let (bridge, _) = bridge_with(vec![("web", web_server())]).await;
    let conn = bridge.manager().get_connection_by_name("web").await.unwrap();
    conn.reset_stats();
    let model = ScriptedModel::new(vec![ChatResponse::stop(ChatMessage::assistant("done"))]);

    let request = ChatRequest::new(
        "m",
        vec![ChatMessage::system("You are helpful."), ChatMessage::user("hi")],
    );
    ChatOrchestrator::new(bridge)
        .run(&model, request, 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(conn.stats().request_count, 1);
    let requests = model.requests.lock();
    assert_eq!(requests[0].tools.len(), 1);
    assert!(requests[0].messages[0].content.contains("web__search"));
}

#[tokio::test]
async fn test_chat_return_direct_short_circuits() {
    let direct = FakeServer::new(vec![tool("render", "", json!({}))]).with_handler(|_, _| CallResult {
        content: vec![McpContent::text("<table/>")],
        is_error: false,
        meta: Some(json!({"returnDirect": true})),
    });
    let (bridge, _) = bridge_with(vec![("ui", direct)]).await;
    let model = ScriptedModel::always(tool_call_response(vec![
        ToolCall::new("call_1", "ui__render", "{}"),
        ToolCall::new("call_2", "ui__render", "{}"),
    ]));

    let response = ChatOrchestrator::new(bridge)
        .run(&model, ChatRequest::new("m", vec![ChatMessage::user("show")]), 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(response.message.role, MessageRole::Assistant);
    assert_eq!(response.message.content, "<table/>");
    assert!(response.message.tool_calls.is_none());
}

#[tokio::test]
async fn test_chat_reports_tool_failures_to_model() {
    let (bridge, _) = bridge_with(vec![("web", web_server())]).await;
    let model = ScriptedModel::new(vec![
        tool_call_response(vec![ToolCall::new("call_1", "web__missing", "{}")]),
        ChatResponse::stop(ChatMessage::assistant("sorry")),
    ]);

    let response = ChatOrchestrator::new(bridge)
        .run(&model, ChatRequest::new("m", vec![ChatMessage::user("hi")]), 5, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.message.content, "sorry");

    let requests = model.requests.lock();
    let tool_message = requests[1].messages.last().unwrap();
    assert_eq!(tool_message.role, MessageRole::Tool);
    assert!(tool_message.content.starts_with("Error: "));
}

#[tokio::test]
async fn test_chat_without_tools_is_plain() {
    let (bridge, _) = bridge_with(vec![]).await;
    let model = ScriptedModel::new(vec![ChatResponse::stop(ChatMessage::assistant("hello"))]);

    let mut request = ChatRequest::new("m", vec![ChatMessage::system("base"), ChatMessage::user("hi")]);
    request.tool_choice = Some("auto".to_string());
    let response = ChatOrchestrator::new(bridge)
        .run(&model, request, 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.message.content, "hello");
    let requests = model.requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].tools.is_empty());
    assert!(requests[0].tool_choice.is_none());
    assert_eq!(requests[0].messages[0].content, "base");
}

#[tokio::test]
async fn test_chat_cancelled_before_model_call() {
    let (bridge, _) = bridge_with(vec![("web", web_server())]).await;
    let model = ScriptedModel::new(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = ChatOrchestrator::new(bridge)
        .run(&model, ChatRequest::new("m", vec![ChatMessage::user("hi")]), 5, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, ChatError::Cancelled);
    assert_eq!(model.calls(), 0);
}
