//! Tool bridge between the connection manager and a chat model
//!
//! Exposes every live server's tools as OpenAI-shaped function tools named
//! `<server>__<tool>`, executes calls by that qualified name, and renders
//! tool results as text.

mod format;
mod prompt;
mod schema;

pub use format::format_call_result;
pub use schema::sanitize_json_schema;

use crate::chat::messages::{FunctionTool, ToolCall};
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::manager::ConnectionManager;
use crate::mcp::types::McpTool;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Separator between server name and tool name
pub const TOOL_NAME_SEPARATOR: &str = "__";

/// Build the qualified name of `tool` on `server`
pub fn qualify(server: &str, tool: &str) -> String {
    format!("{}{}{}", server, TOOL_NAME_SEPARATOR, tool)
}

/// Split a qualified name at the first separator
///
/// Prefer [`ToolBridge::resolve`] when server names may contain the separator.
pub fn split_qualified_name(qualified: &str) -> Option<(&str, &str)> {
    qualified
        .split_once(TOOL_NAME_SEPARATOR)
        .filter(|(server, tool)| !server.is_empty() && !tool.is_empty())
}

/// Formatted output of one tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Result content rendered as text
    pub content: String,
    /// The tool asked for its output to go straight to the user
    pub return_direct: bool,
}

/// Bridge from chat tool calls to tool servers
#[derive(Debug, Clone)]
pub struct ToolBridge {
    manager: ConnectionManager,
}

impl ToolBridge {
    /// Create a bridge over `manager`
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Underlying manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// List the tools of every live server once
    pub async fn snapshot(&self, cancel: &CancellationToken) -> ToolSnapshot {
        ToolSnapshot {
            by_server: self.manager.get_all_tools(cancel).await,
        }
    }

    /// Every live tool as an OpenAI-shaped function tool, sorted by name
    pub async fn to_openai_tools(&self, cancel: &CancellationToken) -> Vec<FunctionTool> {
        self.snapshot(cancel).await.openai_tools()
    }

    /// Resolve a qualified name to `(server, tool)` using live server names
    ///
    /// The longest matching server name wins, so `a__b__c` resolves to server
    /// `a__b` when both `a` and `a__b` are live.
    pub async fn resolve(&self, qualified: &str) -> McpResult<(String, String)> {
        let servers = self.manager.connected_server_names().await;
        servers
            .iter()
            .filter_map(|server| {
                qualified
                    .strip_prefix(server.as_str())
                    .and_then(|rest| rest.strip_prefix(TOOL_NAME_SEPARATOR))
                    .filter(|tool| !tool.is_empty())
                    .map(|tool| (server, tool))
            })
            .max_by_key(|(server, _)| server.len())
            .map(|(server, tool)| (server.clone(), tool.to_string()))
            .ok_or_else(|| McpError::ToolNotFound(qualified.to_string()))
    }

    /// Execute a tool by qualified name with raw JSON arguments
    pub async fn execute_by_qualified_name(
        &self,
        qualified: &str,
        raw_arguments: &str,
        cancel: &CancellationToken,
    ) -> McpResult<ToolOutput> {
        let (server, tool) = self.resolve(qualified).await?;
        let arguments = parse_arguments(raw_arguments)?;
        debug!(server = %server, tool = %tool, "executing tool");

        let result = self
            .manager
            .call_tool_by_name(&server, &tool, arguments, cancel)
            .await?;
        let content = format_call_result(&result.content);
        if result.is_error {
            return Err(McpError::ToolExecution(content));
        }
        Ok(ToolOutput {
            content,
            return_direct: result.return_direct(),
        })
    }

    /// Execute a tool call produced by the model
    pub async fn execute_tool_call(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> McpResult<ToolOutput> {
        self.execute_by_qualified_name(&call.function.name, &call.function.arguments, cancel)
            .await
    }

    /// Append a listing of the available tools to `base`
    ///
    /// Returns `base` unchanged when no tools are available.
    pub async fn build_augmented_system_prompt(
        &self,
        base: &str,
        cancel: &CancellationToken,
    ) -> String {
        self.snapshot(cancel).await.augment_prompt(base)
    }
}

/// Tools of the live servers, keyed by server name
#[derive(Debug, Clone, Default)]
pub struct ToolSnapshot {
    by_server: HashMap<String, Vec<McpTool>>,
}

impl ToolSnapshot {
    /// OpenAI-shaped function tools, sorted by qualified name
    ///
    /// A tool whose schema cannot be converted is skipped with a warning.
    pub fn openai_tools(&self) -> Vec<FunctionTool> {
        let mut tools = Vec::new();
        for (server, server_tools) in &self.by_server {
            for tool in server_tools {
                let name = qualify(server, &tool.name);
                match schema::to_parameters(&tool.input_schema) {
                    Ok(parameters) => tools.push(FunctionTool::new(
                        name,
                        tool.description.clone().unwrap_or_default(),
                        parameters,
                    )),
                    Err(reason) => warn!(tool = %name, %reason, "skipping tool with unusable schema"),
                }
            }
        }
        tools.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        tools
    }

    /// `base` followed by the tool listing grouped by server
    pub fn augment_prompt(&self, base: &str) -> String {
        prompt::augment(base, &self.by_server)
    }
}

/// Decode raw model arguments; blank means no arguments
fn parse_arguments(raw: &str) -> McpResult<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(other) => Err(McpError::invalid_request(format!(
            "tool arguments must be a JSON object, got {}",
            other
        ))),
        Err(e) => Err(McpError::invalid_request(format!(
            "tool arguments are not valid JSON: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_qualify_and_split() {
        let name = qualify("web", "search");
        assert_eq!(name, "web__search");
        assert_eq!(split_qualified_name(&name), Some(("web", "search")));
        assert_eq!(split_qualified_name("nosep"), None);
        assert_eq!(split_qualified_name("__tool"), None);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), json!({}));
        assert_eq!(parse_arguments("  null ").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"a":2}"#).unwrap(), json!({"a": 2}));
        assert!(matches!(parse_arguments("[1,2]"), Err(McpError::InvalidRequest(_))));
        assert!(matches!(parse_arguments("{oops"), Err(McpError::InvalidRequest(_))));
    }

    #[test]
    fn test_snapshot_skips_unusable_schema() {
        let mut by_server = HashMap::new();
        by_server.insert(
            "calc".to_string(),
            vec![
                McpTool::new("sub").with_input_schema(json!({"type": "object"})),
                McpTool::new("add").with_description("Add numbers"),
                McpTool::new("bad").with_input_schema(json!({"type": "array"})),
            ],
        );
        let snapshot = ToolSnapshot { by_server };

        let names: Vec<_> = snapshot
            .openai_tools()
            .into_iter()
            .map(|t| t.function.name)
            .collect();
        assert_eq!(names, vec!["calc__add", "calc__sub"]);
        assert!(snapshot.augment_prompt("Base.").contains("- calc__add: Add numbers"));
    }
}
