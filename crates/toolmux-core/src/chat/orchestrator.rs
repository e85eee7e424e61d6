//! Bounded chat-tool loop

use super::error::ChatError;
use super::messages::{ChatMessage, MessageRole};
use super::model::{ChatModel, ChatRequest, ChatResponse};
use crate::bridge::ToolBridge;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Iterations used when the caller passes a non-positive budget
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Drives a chat model through rounds of tool calls
#[derive(Debug, Clone)]
pub struct ChatOrchestrator {
    bridge: ToolBridge,
    default_iterations: usize,
}

impl ChatOrchestrator {
    /// Create an orchestrator executing tools through `bridge`
    pub fn new(bridge: ToolBridge) -> Self {
        Self {
            bridge,
            default_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Budget used when `run` gets a non-positive one; non-positive keeps the default
    pub fn with_default_iterations(mut self, iterations: i32) -> Self {
        if let Some(n) = positive(iterations) {
            self.default_iterations = n;
        }
        self
    }

    /// Budget used when `run` gets a non-positive one
    pub fn default_iterations(&self) -> usize {
        self.default_iterations
    }

    /// Tool bridge in use
    pub fn bridge(&self) -> &ToolBridge {
        &self.bridge
    }

    /// Run one chat turn, executing requested tools until the model answers
    ///
    /// With no tools discoverable the request goes to the model once, as is.
    /// Otherwise the bridged tools are attached and, when the first message
    /// is a system message, its content is replaced by the tool-augmented
    /// prompt. Each round calls the model once; a response without tool calls
    /// is final. A tool whose result asks to return directly ends the turn
    /// with that output. Failed tool calls are reported back to the model as
    /// `Error: ...` tool messages.
    ///
    /// When `max_iterations` rounds pass without a final answer, the last
    /// assistant message in the history is returned. A non-positive budget
    /// means [`default_iterations`](Self::default_iterations).
    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn run(
        &self,
        model: &dyn ChatModel,
        mut request: ChatRequest,
        max_iterations: i32,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ChatError> {
        let max = positive(max_iterations).unwrap_or(self.default_iterations);
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }

        let snapshot = self.bridge.snapshot(cancel).await;
        let tools = snapshot.openai_tools();
        if tools.is_empty() {
            debug!("no tools available, plain model call");
            request.tools.clear();
            request.tool_choice = None;
            return model.chat(request, cancel).await;
        }

        if let Some(first) = request.messages.first_mut() {
            if first.role == MessageRole::System {
                first.content = snapshot.augment_prompt(&first.content);
            }
        }
        request.tools = tools;
        if request.tool_choice.is_none() {
            request.tool_choice = Some("auto".to_string());
        }

        for iteration in 1..=max {
            if cancel.is_cancelled() {
                return Err(ChatError::Cancelled);
            }

            let response = model.chat(request.clone(), cancel).await?;
            let calls = response.message.requested_tool_calls().to_vec();
            if calls.is_empty() {
                debug!(iteration, "model answered without tool calls");
                return Ok(response);
            }

            info!(iteration, count = calls.len(), "executing tool calls");
            request.messages.push(ChatMessage::assistant_with_tools(
                response.message.content.clone(),
                calls.clone(),
            ));

            for call in &calls {
                match self.bridge.execute_tool_call(call, cancel).await {
                    Ok(output) if output.return_direct => {
                        debug!(tool = %call.function.name, "tool returned directly");
                        return Ok(ChatResponse::stop(ChatMessage::assistant(output.content)));
                    }
                    Ok(output) => {
                        request
                            .messages
                            .push(ChatMessage::tool(output.content, call.id.clone()));
                    }
                    Err(e) if e.is_cancelled() => return Err(ChatError::Cancelled),
                    Err(e) => {
                        warn!(tool = %call.function.name, error = %e, "tool call failed");
                        request
                            .messages
                            .push(ChatMessage::tool(format!("Error: {}", e), call.id.clone()));
                    }
                }
            }
        }

        warn!(max, "iteration budget exhausted");
        request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .cloned()
            .map(|message| ChatResponse {
                message,
                finish_reason: Some("length".to_string()),
            })
            .ok_or(ChatError::IterationBudgetExhausted { max })
    }
}

fn positive(n: i32) -> Option<usize> {
    usize::try_from(n).ok().filter(|n| *n > 0)
}
