// crates/fluent-engines/src/providers/local.rs

//! Client for self-hosted, zero-cost models served behind an
//! OpenAI-compatible endpoint (llama.cpp, vLLM, text-generation-inference).
//! Reuses the OpenAI wire format since that's the de facto standard these
//! servers implement; the only difference is the base URL and that a
//! missing API key is not an error (many local servers don't require one).

use crate::providers::openai::OpenAiClient;
use crate::providers::ProviderClient;
use fluent_core::error::RouterResult;
use fluent_core::types::{ApiResponse, Message, ModelCapability, RequestOptions};
use std::collections::HashMap;

const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:8080/v1/chat/completions";

pub struct LocalClient {
    inner: OpenAiClient,
}

impl LocalClient {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        let base_url = credentials
            .get("base_url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOCAL_BASE_URL.to_string());
        Self {
            inner: OpenAiClient::with_base_url(credentials, base_url),
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for LocalClient {
    async fn chat(
        &self,
        messages: &[Message],
        capability: &ModelCapability,
        options: &RequestOptions,
    ) -> RouterResult<ApiResponse> {
        self.inner.chat(messages, capability, options).await
    }
}
