// crates/fluent-engines/src/providers/anthropic.rs

//! Anthropic Messages API client. Anthropic splits the system prompt out
//! of the message list and returns content as a list of typed blocks
//! rather than a single string, so this client normalizes both on the
//! way in and out.

use crate::providers::{classify_http_status, ProviderClient};
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::types::{
    ApiResponse, FinishReason, Message, ModelCapability, RequestOptions, Role, ToolCall, Usage,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        Self::with_base_url(credentials, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(credentials: HashMap<String, String>, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: credentials.get("api_key").cloned().unwrap_or_default(),
            base_url,
        }
    }

    fn build_payload(messages: &[Message], capability: &ModelCapability, options: &RequestOptions) -> Value {
        let system: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let wire_messages: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                    Role::System => unreachable!("filtered above"),
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut payload = json!({
            "model": capability.api_name,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": wire_messages,
        });
        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if let Some(temp) = options.temperature {
            payload["temperature"] = json!(temp);
        }
        if !options.tool_definitions.is_empty() {
            payload["tools"] = json!(options
                .tool_definitions
                .iter()
                .map(|t| json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                }))
                .collect::<Vec<_>>());
        }
        payload
    }

    fn parse_response(body: &Value, fallback_model_id: &str) -> RouterResult<ApiResponse> {
        let blocks = body
            .get("content")
            .and_then(|v| v.as_array())
            .ok_or_else(|| RouterError::InvalidRequest("missing content blocks in response".into()))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in blocks {
            match block.get("type").and_then(|v| v.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    if let (Some(id), Some(name)) = (
                        block.get("id").and_then(|v| v.as_str()),
                        block.get("name").and_then(|v| v.as_str()),
                    ) {
                        tool_calls.push(ToolCall {
                            id: id.to_string(),
                            name: name.to_string(),
                            arguments: block.get("input").cloned().unwrap_or(Value::Null),
                        });
                    }
                }
                _ => {}
            }
        }

        let finish_reason = match body.get("stop_reason").and_then(|v| v.as_str()) {
            Some("tool_use") => FinishReason::ToolCalls,
            Some("max_tokens") => FinishReason::Length,
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            _ => FinishReason::Stop,
        };

        let usage = Usage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        };

        let model_id = body["model"].as_str().unwrap_or(fallback_model_id).to_string();

        Ok(ApiResponse {
            content,
            usage,
            model_id,
            finish_reason,
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        })
    }
}

#[async_trait::async_trait]
impl ProviderClient for AnthropicClient {
    async fn chat(
        &self,
        messages: &[Message],
        capability: &ModelCapability,
        options: &RequestOptions,
    ) -> RouterResult<ApiResponse> {
        let payload = Self::build_payload(messages, capability, options);

        let response = timeout(
            REQUEST_TIMEOUT,
            self.http
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&payload)
                .send(),
        )
        .await
        .map_err(|_| RouterError::TransientNetwork {
            provider: "anthropic".to_string(),
            message: "request timed out".to_string(),
        })?
        .map_err(|e| RouterError::from_reqwest("anthropic", e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| RouterError::from_reqwest("anthropic", e))?;

        if !status.is_success() {
            return Err(classify_http_status("anthropic", status, &body_text));
        }

        let body: Value = serde_json::from_str(&body_text)
            .map_err(|e| RouterError::InvalidRequest(format!("malformed anthropic response: {e}")))?;
        Self::parse_response(&body, &capability.id)
    }
}
