//! Protocol operations (handshake, tools, resources, prompts)

use super::Connection;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{MCP_PROTOCOL_VERSION, methods};
use crate::mcp::types::{
    CallResult, Capability, CapabilitySet, Implementation, InitializeParams, InitializeResult,
    McpPrompt, McpResource, McpTool, PromptsList, ReadResourceParams, ReadResult, ResourcesList,
    ServerInfo, ToolsList,
};
use serde_json::{Value, json};
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

impl Connection {
    /// Perform the handshake and probe capabilities
    ///
    /// A server that rejects `initialize` with a JSON-RPC error is treated as a
    /// legacy server and gets a ServerInfo named after its config.
    #[instrument(skip(self, cancel), fields(server = %self.config.name), level = "debug")]
    pub async fn initialize(&self, cancel: &CancellationToken) -> McpResult<ServerInfo> {
        if !self.is_connected() {
            return Err(McpError::NotConnected);
        }
        if self.is_initialized() {
            return Err(McpError::AlreadyInitialized);
        }

        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: Implementation::client(),
        };
        let handshake: McpResult<InitializeResult> = self
            .call(methods::INITIALIZE, Some(json!(params)), cancel)
            .await;

        let mut info = match handshake {
            Ok(result) => {
                if let Err(e) = self.notify(methods::INITIALIZED).await {
                    warn!(server = %self.config.name, error = %e, "failed to send initialized notification");
                }
                ServerInfo {
                    name: result.server_info.name,
                    version: result.server_info.version,
                    protocol_version: result.protocol_version,
                    capabilities: CapabilitySet::default(),
                }
            }
            Err(McpError::Server { code, message }) => {
                warn!(
                    server = %self.config.name,
                    code,
                    message = %message,
                    "handshake rejected, assuming legacy server"
                );
                ServerInfo {
                    name: self.config.name.clone(),
                    version: "unknown".to_string(),
                    protocol_version: None,
                    capabilities: CapabilitySet::default(),
                }
            }
            Err(e) => return Err(e),
        };

        self.initialized.store(true, Ordering::SeqCst);
        info.capabilities = self.probe_capabilities(cancel).await;
        *self.server_info.write() = Some(info.clone());

        info!(
            server = %self.config.name,
            remote = %info.name,
            version = %info.version,
            tools = ?info.capabilities.tools,
            resources = ?info.capabilities.resources,
            prompts = ?info.capabilities.prompts,
            "initialized"
        );
        Ok(info)
    }

    /// Trial list calls; see [`Capability`] for how outcomes are classified
    async fn probe_capabilities(&self, cancel: &CancellationToken) -> CapabilitySet {
        let tools = self.call::<ToolsList>(methods::TOOLS_LIST, None, cancel).await;
        let resources = self
            .call::<ResourcesList>(methods::RESOURCES_LIST, None, cancel)
            .await;
        let prompts = self
            .call::<PromptsList>(methods::PROMPTS_LIST, None, cancel)
            .await;
        CapabilitySet {
            tools: Capability::from_probe(&tools),
            resources: Capability::from_probe(&resources),
            prompts: Capability::from_probe(&prompts),
        }
    }

    /// List available tools
    #[instrument(skip(self, cancel), fields(server = %self.config.name), level = "debug")]
    pub async fn list_tools(&self, cancel: &CancellationToken) -> McpResult<Vec<McpTool>> {
        self.ensure_initialized()?;
        let list: ToolsList = self.call(methods::TOOLS_LIST, None, cancel).await?;
        Ok(list.tools)
    }

    /// Call a tool
    #[instrument(skip(self, arguments, cancel), fields(server = %self.config.name, tool = %name), level = "debug")]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> McpResult<CallResult> {
        self.ensure_initialized()?;
        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        self.call(methods::TOOLS_CALL, Some(params), cancel).await
    }

    /// List available resources
    pub async fn list_resources(&self, cancel: &CancellationToken) -> McpResult<Vec<McpResource>> {
        self.ensure_initialized()?;
        let list: ResourcesList = self.call(methods::RESOURCES_LIST, None, cancel).await?;
        Ok(list.resources)
    }

    /// Read a resource
    pub async fn read_resource(
        &self,
        params: ReadResourceParams,
        cancel: &CancellationToken,
    ) -> McpResult<ReadResult> {
        self.ensure_initialized()?;
        let params = serde_json::to_value(params)?;
        self.call(methods::RESOURCES_READ, Some(params), cancel).await
    }

    /// List available prompts
    pub async fn list_prompts(&self, cancel: &CancellationToken) -> McpResult<Vec<McpPrompt>> {
        self.ensure_initialized()?;
        let list: PromptsList = self.call(methods::PROMPTS_LIST, None, cancel).await?;
        Ok(list.prompts)
    }

    /// Ping the server
    pub async fn ping(&self, cancel: &CancellationToken) -> McpResult<()> {
        self.request(methods::PING, None, cancel).await.map(|_| ())
    }
}
