// crates/fluent-engines/src/providers/mock.rs

//! In-process test double for `ProviderClient`. Lets the Orchestrator,
//! Executor, and Consensus tests exercise the full routing pipeline
//! without any network dependency, matching the teacher's own preference
//! for hand-rolled doubles over a mocking framework.

use crate::providers::ProviderClient;
use fluent_core::error::{RouterError, RouterResult};
use fluent_core::types::{ApiResponse, FinishReason, Message, ModelCapability, RequestOptions, Usage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted outcome for a single `chat()` call.
pub enum Scripted {
    Success(ApiResponse),
    Failure(RouterError),
}

/// Replays a fixed script of responses/errors in order, one per call;
/// repeats the final entry once the script is exhausted. Records every
/// call's messages for assertions about what the executor/orchestrator
/// actually sent.
pub struct MockProviderClient {
    script: Mutex<Vec<Scripted>>,
    cursor: AtomicUsize,
    pub calls: Mutex<Vec<Vec<Message>>>,
}

impl MockProviderClient {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script),
            cursor: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_success() -> Self {
        Self::new(vec![Scripted::Success(ApiResponse {
            content: "ok".to_string(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            model_id: "mock-model".to_string(),
            finish_reason: FinishReason::Stop,
            tool_calls: None,
        })])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ProviderClient for MockProviderClient {
    async fn chat(
        &self,
        messages: &[Message],
        capability: &ModelCapability,
        _options: &RequestOptions,
    ) -> RouterResult<ApiResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let script = self.script.lock().unwrap();
        let index = self.cursor.fetch_add(1, Ordering::SeqCst).min(script.len() - 1);
        match &script[index] {
            Scripted::Success(response) => {
                let mut response = ApiResponse {
                    content: response.content.clone(),
                    usage: response.usage,
                    model_id: capability.id.clone(),
                    finish_reason: response.finish_reason,
                    tool_calls: response.tool_calls.clone(),
                };
                response.model_id = capability.id.clone();
                Ok(response)
            }
            Scripted::Failure(err) => Err(clone_error(err)),
        }
    }
}

/// `RouterError` has no `Clone` impl (it wraps provider-specific context
/// that doesn't need to be cloneable in production); the mock only needs
/// a handful of variants reproducible for a scripted replay.
fn clone_error(err: &RouterError) -> RouterError {
    match err {
        RouterError::RateLimited { provider, retry_after } => RouterError::RateLimited {
            provider: provider.clone(),
            retry_after: *retry_after,
        },
        RouterError::AuthFailed { provider, message } => RouterError::AuthFailed {
            provider: provider.clone(),
            message: message.clone(),
        },
        RouterError::TransientNetwork { provider, message } => RouterError::TransientNetwork {
            provider: provider.clone(),
            message: message.clone(),
        },
        RouterError::ProviderError { provider, code, message } => RouterError::ProviderError {
            provider: provider.clone(),
            code: code.clone(),
            message: message.clone(),
        },
        RouterError::ContextExceeded { provider, context_window } => RouterError::ContextExceeded {
            provider: provider.clone(),
            context_window: *context_window,
        },
        RouterError::InvalidRequest(msg) => RouterError::InvalidRequest(msg.clone()),
        RouterError::Cancelled => RouterError::Cancelled,
        other => RouterError::InvalidRequest(format!("unsupported mock error variant: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluent_core::types::Provider;

    fn capability() -> ModelCapability {
        ModelCapability {
            id: "mock".into(),
            provider: Provider::Local,
            api_name: "mock".into(),
            context_window: 8_000,
            input_cost: 0.0,
            output_cost: 0.0,
            reasoning_score: 80,
            coding_score: 80,
            speed_rating: 10,
            supports_vision: false,
            supports_function_calling: true,
            blocked: false,
        }
    }

    #[tokio::test]
    async fn replays_script_then_repeats_last_entry() {
        let mock = MockProviderClient::new(vec![
            Scripted::Failure(RouterError::RateLimited {
                provider: "mock".into(),
                retry_after: None,
            }),
            Scripted::Success(ApiResponse {
                content: "done".into(),
                usage: Usage::default(),
                model_id: "mock".into(),
                finish_reason: FinishReason::Stop,
                tool_calls: None,
            }),
        ]);
        let cap = capability();
        let opts = RequestOptions::default();
        let messages = vec![Message::user("hi")];

        assert!(mock.chat(&messages, &cap, &opts).await.is_err());
        let second = mock.chat(&messages, &cap, &opts).await.unwrap();
        assert_eq!(second.content, "done");
        let third = mock.chat(&messages, &cap, &opts).await.unwrap();
        assert_eq!(third.content, "done");
        assert_eq!(mock.call_count(), 3);
    }
}
