// crates/fluent-agent/src/executor.rs

//! Runs a single request against a chosen (model, client) pair, looping
//! for function-call invocation up to a hard iteration cap, and reports
//! usage to the cost ledger exactly once per outer request regardless of
//! how many loop iterations it took.

use fluent_core::cost_ledger::{calculate_cost, CostLedger};
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::types::{ApiResponse, FinishReason, Message, ModelCapability, RequestOptions, Role, Usage};
use fluent_engines::providers::ProviderClient;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;

/// A caller-registered function the model may invoke mid-conversation.
/// `call` receives the raw JSON arguments the model supplied and returns
/// either the tool's string result or an error message — the executor
/// never panics on a handler failure, it folds it into the conversation
/// as a tool-role error message and keeps the loop going.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: serde_json::Value) -> Result<String, String>;
}

pub struct ConversationExecutor {
    tool_handlers: HashMap<String, Arc<dyn ToolHandler>>,
    cost_ledger: Arc<CostLedger>,
    max_loop_iterations: u32,
}

impl ConversationExecutor {
    pub fn new(cost_ledger: Arc<CostLedger>, max_loop_iterations: u32) -> Self {
        Self {
            tool_handlers: HashMap::new(),
            cost_ledger,
            max_loop_iterations,
        }
    }

    pub fn register_function(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.tool_handlers.insert(name.into(), handler);
    }

    /// Executes `messages` against `client`, following the function-call
    /// loop in spec §4.6. Returns the final normalized response, or the
    /// provider error that aborted the attempt (in which case a zero-token
    /// cost record has already been appended so the ledger still notes the
    /// attempt).
    pub async fn execute(
        &self,
        client: &Arc<dyn ProviderClient>,
        capability: &ModelCapability,
        messages: Vec<Message>,
        options: &RequestOptions,
        request_id: &str,
    ) -> RouterResult<ApiResponse> {
        let mut conversation = messages;
        let mut total_usage = Usage::default();

        for iteration in 0..self.max_loop_iterations {
            let response = match client.chat(&conversation, capability, options).await {
                Ok(response) => response,
                Err(err) => {
                    self.cost_ledger
                        .record(&capability.id, total_usage, calculate_cost(capability, total_usage), request_id, Some(err.kind().to_string()))
                        .await;
                    return Err(err);
                }
            };

            total_usage.input_tokens += response.usage.input_tokens;
            total_usage.output_tokens += response.usage.output_tokens;

            if response.finish_reason != FinishReason::ToolCalls {
                self.record_final(capability, total_usage, request_id, None).await;
                return Ok(response);
            }

            let tool_calls = response.tool_calls.clone().unwrap_or_default();
            conversation.push(Message {
                role: Role::Assistant,
                content: response.content.clone(),
                tool_calls: Some(tool_calls.clone()),
                tool_call_id: None,
            });

            for tool_call in &tool_calls {
                let handler = self.tool_handlers.get(&tool_call.name).cloned();
                let Some(handler) = handler else {
                    self.record_final(
                        capability,
                        total_usage,
                        request_id,
                        Some("tool_handler_missing".to_string()),
                    )
                    .await;
                    return Err(RouterError::ToolHandlerFailed {
                        tool: tool_call.name.clone(),
                        message: "no handler registered for this tool name".to_string(),
                    });
                };

                let result = match handler.call(tool_call.arguments.clone()).await {
                    Ok(output) => output,
                    Err(message) => {
                        warn!("tool handler '{}' raised: {message}", tool_call.name);
                        serde_json::json!({ "error": message }).to_string()
                    }
                };
                conversation.push(Message::tool_result(tool_call.id.clone(), result));
            }

            if iteration + 1 == self.max_loop_iterations {
                let capped = ApiResponse {
                    content: response.content,
                    usage: total_usage,
                    model_id: response.model_id,
                    finish_reason: FinishReason::Length,
                    tool_calls: None,
                };
                self.record_final(capability, total_usage, request_id, Some("tool_loop_cap".to_string()))
                    .await;
                return Ok(capped);
            }
        }

        unreachable!("loop always returns by its last iteration")
    }

    async fn record_final(
        &self,
        capability: &ModelCapability,
        usage: Usage,
        request_id: &str,
        note: Option<String>,
    ) {
        let cost = calculate_cost(capability, usage);
        self.cost_ledger.record(&capability.id, usage, cost, request_id, note).await;
    }
}
