// crates/fluent-engines/src/providers/openai.rs

//! OpenAI-wire-compatible chat completions client. Also used for any
//! provider whose API mirrors OpenAI's `/v1/chat/completions` shape
//! (xAI and Azure OpenAI deployments both do, modulo base URL), selected
//! by the Client Pool's factory per `Provider`.

use crate::providers::{classify_http_status, ProviderClient};
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::types::{
    ApiResponse, FinishReason, Message, ModelCapability, RequestOptions, Role, ToolCall, Usage,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
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

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    fn build_payload(messages: &[Message], capability: &ModelCapability, options: &RequestOptions) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let mut obj = json!({
                    "role": Self::role_str(m.role),
                    "content": m.content,
                });
                if let Some(tool_calls) = &m.tool_calls {
                    obj["tool_calls"] = json!(tool_calls
                        .iter()
                        .map(|tc| json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments.to_string() },
                        }))
                        .collect::<Vec<_>>());
                }
                if let Some(id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(id);
                }
                obj
            })
            .collect();

        let mut payload = json!({
            "model": capability.api_name,
            "messages": wire_messages,
        });
        if let Some(temp) = options.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = options.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if !options.tool_definitions.is_empty() {
            payload["tools"] = json!(options
                .tool_definitions
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
                }))
                .collect::<Vec<_>>());
        }
        payload
    }

    fn parse_response(body: &Value, fallback_model_id: &str) -> RouterResult<ApiResponse> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| RouterError::InvalidRequest("missing choices[0] in response".into()))?;
        let message = choice
            .get("message")
            .ok_or_else(|| RouterError::InvalidRequest("missing message in choice".into()))?;

        let content = message
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let finish_reason = match choice.get("finish_reason").and_then(|v| v.as_str()) {
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            Some("stop") => FinishReason::Stop,
            _ => FinishReason::Stop,
        };

        let tool_calls = message.get("tool_calls").and_then(|v| v.as_array()).map(|calls| {
            calls
                .iter()
                .filter_map(|c| {
                    let id = c.get("id")?.as_str()?.to_string();
                    let function = c.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let arguments_raw = function.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
                    let arguments = serde_json::from_str(arguments_raw).unwrap_or(Value::Null);
                    Some(ToolCall { id, name, arguments })
                })
                .collect::<Vec<_>>()
        });

        let usage = Usage {
            input_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        let model_id = body["model"].as_str().unwrap_or(fallback_model_id).to_string();

        Ok(ApiResponse {
            content,
            usage,
            model_id,
            finish_reason,
            tool_calls,
        })
    }
}

#[async_trait::async_trait]
impl ProviderClient for OpenAiClient {
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
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send(),
        )
        .await
        .map_err(|_| RouterError::TransientNetwork {
            provider: "openai".to_string(),
            message: "request timed out".to_string(),
        })?
        .map_err(|e| RouterError::from_reqwest("openai", e))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| RouterError::from_reqwest("openai", e))?;

        if !status.is_success() {
            return Err(classify_http_status("openai", status, &body_text));
        }

        let body: Value = serde_json::from_str(&body_text)
            .map_err(|e| RouterError::InvalidRequest(format!("malformed openai response: {e}")))?;
        Self::parse_response(&body, &capability.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluent_core::types::FinishReason;

    #[test]
    fn parse_response_extracts_content_and_usage() {
        let body = json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "message": { "content": "hello" },
                "finish_reason": "stop",
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5 },
        });
        let response = OpenAiClient::parse_response(&body, "gpt-4o").unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(response.usage.input_tokens, 10);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn parse_response_decodes_tool_calls() {
        let body = json!({
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "get_time", "arguments": "{\"tz\":\"UTC\"}" }
                    }]
                },
                "finish_reason": "tool_calls",
            }],
            "usage": { "prompt_tokens": 1, "completion_tokens": 1 },
        });
        let response = OpenAiClient::parse_response(&body, "gpt-4o").unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        let calls = response.tool_calls.unwrap();
        assert_eq!(calls[0].name, "get_time");
        assert_eq!(calls[0].arguments["tz"], "UTC");
    }

    #[test]
    fn parse_response_rejects_missing_choices() {
        let body = json!({ "choices": [] });
        assert!(OpenAiClient::parse_response(&body, "gpt-4o").is_err());
    }
}
